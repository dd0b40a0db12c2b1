//! Partner selections: one chosen option and baseline capture per deliverable.
//!
//! Raw partner input ([`SelectionInput`]) is validated once against the
//! catalog into a [`ValidatedSelections`] value. Only that value can be handed
//! to the ledger, so nothing downstream re-checks completeness or ownership.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::catalog::{is_percentage, BilingualText, Catalog, OptionTarget};
use crate::error::{PactError, Violation};

/// Baseline measurement as submitted by the partner, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineInput {
    pub baseline_percent: Option<Decimal>,
    #[serde(default)]
    pub source: String,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    #[serde(default)]
    pub measured_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionInput {
    pub deliverable_id: String,
    pub option_id: String,
    pub baseline: BaselineInput,
}

/// A complete, validated baseline capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineCapture {
    pub baseline_percent: Decimal,
    pub source: String,
    #[serde(with = "crate::iso_date")]
    pub measured_on: Date,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A persisted selection. `(partner_id, deliverable_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub partner_id: String,
    pub deliverable_id: String,
    pub option_id: String,
    pub baseline: BaselineCapture,
    /// RFC 3339 timestamp.
    pub recorded_at: String,
}

/// One validated `(deliverable, option, baseline)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSelection {
    pub deliverable_id: String,
    pub option_id: String,
    pub baseline: BaselineCapture,
}

/// Selections covering every deliverable of a catalog exactly once.
///
/// Can only be obtained through [`ValidatedSelections::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSelections {
    items: Vec<ValidatedSelection>,
}

impl ValidatedSelections {
    /// Validate a full selection payload against `catalog`.
    ///
    /// All-or-nothing: every failing deliverable is reported in a single
    /// `PactError::Validation`.
    pub fn validate(catalog: &Catalog, inputs: &[SelectionInput]) -> Result<Self, PactError> {
        let mut violations = Vec::new();
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let mut items = Vec::new();

        for input in inputs {
            let did = input.deliverable_id.as_str();
            *seen.entry(did).or_default() += 1;
            if seen[did] > 1 {
                if seen[did] == 2 {
                    violations.push(Violation::deliverable(
                        did,
                        "deliverable_id",
                        "selected more than once",
                    ));
                }
                continue;
            }

            let Some(deliverable) = catalog.deliverable(did) else {
                violations.push(Violation::deliverable(
                    did,
                    "deliverable_id",
                    format!("not part of the '{}' catalog", catalog.contract_type),
                ));
                continue;
            };

            let before = violations.len();
            if deliverable.option(&input.option_id).is_none() {
                violations.push(Violation::deliverable(
                    did,
                    "option_id",
                    format!("option '{}' does not belong to this deliverable", input.option_id),
                ));
            }
            let capture = validate_baseline(did, &input.baseline, &mut violations);
            if violations.len() == before {
                if let Some(baseline) = capture {
                    items.push(ValidatedSelection {
                        deliverable_id: did.to_string(),
                        option_id: input.option_id.clone(),
                        baseline,
                    });
                }
            }
        }

        for d in &catalog.deliverables {
            if !seen.contains_key(d.id.as_str()) {
                violations.push(Violation::deliverable(&d.id, "deliverable_id", "no selection"));
            }
        }

        if !violations.is_empty() {
            return Err(PactError::Validation(violations));
        }

        let order: BTreeMap<&str, u32> = catalog
            .deliverables
            .iter()
            .map(|d| (d.id.as_str(), d.number))
            .collect();
        items.sort_by_key(|s| order.get(s.deliverable_id.as_str()).copied());
        Ok(ValidatedSelections { items })
    }

    pub fn items(&self) -> &[ValidatedSelection] {
        &self.items
    }

    /// Materialize persisted selections for `partner_id`.
    pub fn into_selections(self, partner_id: &str, recorded_at: &str) -> Vec<Selection> {
        self.items
            .into_iter()
            .map(|s| Selection {
                partner_id: partner_id.to_string(),
                deliverable_id: s.deliverable_id,
                option_id: s.option_id,
                baseline: s.baseline,
                recorded_at: recorded_at.to_string(),
            })
            .collect()
    }

    /// Whether `existing` already holds exactly these choices and captures.
    pub fn matches(&self, existing: &[Selection]) -> bool {
        if existing.len() != self.items.len() {
            return false;
        }
        let by_deliverable: BTreeMap<&str, &Selection> = existing
            .iter()
            .map(|s| (s.deliverable_id.as_str(), s))
            .collect();
        self.items.iter().all(|v| {
            by_deliverable
                .get(v.deliverable_id.as_str())
                .is_some_and(|s| s.option_id == v.option_id && s.baseline == v.baseline)
        })
    }
}

fn validate_baseline(
    deliverable_id: &str,
    input: &BaselineInput,
    violations: &mut Vec<Violation>,
) -> Option<BaselineCapture> {
    let mut ok = true;

    let baseline = match input.baseline_percent {
        Some(b) if is_percentage(b) => Some(b),
        Some(b) => {
            violations.push(Violation::deliverable(
                deliverable_id,
                "baseline_percent",
                format!("{} is outside [0, 100]", b),
            ));
            None
        }
        None => {
            violations.push(Violation::deliverable(deliverable_id, "baseline_percent", "required"));
            None
        }
    };

    let source = input.source.trim();
    if source.is_empty() {
        violations.push(Violation::deliverable(deliverable_id, "source", "must not be empty"));
        ok = false;
    }

    let measured_on = match parse_date(&input.measured_on) {
        Some(d) => Some(d),
        None => {
            violations.push(Violation::deliverable(
                deliverable_id,
                "measured_on",
                format!("'{}' is not a valid YYYY-MM-DD date", input.measured_on),
            ));
            None
        }
    };

    match (baseline, measured_on) {
        (Some(baseline_percent), Some(measured_on)) if ok => Some(BaselineCapture {
            baseline_percent,
            source: source.to_string(),
            measured_on,
            note: input
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_owned),
        }),
        _ => None,
    }
}

/// Parse an ISO 8601 calendar date.
pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), time::macros::format_description!("[year]-[month]-[day]")).ok()
}

/// Deliverables of `catalog` that lack exactly one complete, well-formed selection.
pub fn missing_deliverables(catalog: &Catalog, selections: &[Selection]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut well_formed: BTreeSet<&str> = BTreeSet::new();
    for s in selections {
        *counts.entry(s.deliverable_id.as_str()).or_default() += 1;
        let owned = catalog
            .deliverable(&s.deliverable_id)
            .is_some_and(|d| d.option(&s.option_id).is_some());
        let complete = is_percentage(s.baseline.baseline_percent)
            && !s.baseline.source.trim().is_empty();
        if owned && complete {
            well_formed.insert(s.deliverable_id.as_str());
        }
    }
    catalog
        .deliverables
        .iter()
        .filter(|d| {
            counts.get(d.id.as_str()).copied() != Some(1) || !well_formed.contains(d.id.as_str())
        })
        .map(|d| d.id.clone())
        .collect()
}

/// A selection resolved against the catalog for display and document generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionView {
    pub deliverable_id: String,
    pub deliverable_number: u32,
    pub deliverable_title: BilingualText,
    pub timeline: String,
    pub option_id: String,
    pub option_number: u32,
    pub option_text: BilingualText,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_target: Option<OptionTarget>,
    pub baseline: BaselineCapture,
    pub recorded_at: String,
}

/// Resolve `selections` against `catalog`, ordered by deliverable number.
///
/// Selections whose deliverable or option no longer exists in the catalog are
/// skipped.
pub fn resolve_selections(catalog: &Catalog, selections: &[Selection]) -> Vec<SelectionView> {
    let mut views: Vec<SelectionView> = selections
        .iter()
        .filter_map(|s| {
            let d = catalog.deliverable(&s.deliverable_id)?;
            let o = d.option(&s.option_id)?;
            Some(SelectionView {
                deliverable_id: d.id.clone(),
                deliverable_number: d.number,
                deliverable_title: d.title.clone(),
                timeline: d.timeline.clone(),
                option_id: o.id.clone(),
                option_number: o.number,
                option_text: o.text.clone(),
                option_target: o.target,
                baseline: s.baseline.clone(),
                recorded_at: s.recorded_at.clone(),
            })
        })
        .collect();
    views.sort_by_key(|v| v.deliverable_number);
    views
}
