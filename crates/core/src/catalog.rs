//! Deliverables and their enumerated options, per contract type.
//!
//! Catalog content is authored by an external content-admin flow. This module
//! only defines its shape and the structural rules a catalog must satisfy
//! before it can back a partner's configuration.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{NotFound, PactError, Violation};
use crate::partner::ContractType;

/// Text carried in both agreement languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualText {
    pub primary: String,
    pub secondary: String,
}

impl BilingualText {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        BilingualText {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.primary.trim().is_empty() || self.secondary.trim().is_empty()
    }
}

/// Quantitative baseline/target pair attached to an option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTarget {
    pub baseline: Decimal,
    pub target: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverableOption {
    pub id: String,
    pub number: u32,
    pub text: BilingualText,
    /// Absent for options with no quantitative target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<OptionTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: String,
    pub contract_type: ContractType,
    pub number: u32,
    pub title: BilingualText,
    pub timeline: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<BilingualText>,
    pub options: Vec<DeliverableOption>,
}

impl Deliverable {
    pub fn option(&self, option_id: &str) -> Option<&DeliverableOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

/// The ordered deliverables of one configurable contract type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub contract_type: ContractType,
    pub deliverables: Vec<Deliverable>,
}

impl Catalog {
    /// Build a catalog, ordering deliverables and their options by number.
    ///
    /// Returns `NotFound::UnsupportedContractType` for contract types without
    /// configurable deliverables, and `Validation` listing every structural
    /// problem otherwise.
    pub fn new(
        contract_type: ContractType,
        mut deliverables: Vec<Deliverable>,
    ) -> Result<Self, PactError> {
        if !contract_type.is_configurable() {
            return Err(NotFound::UnsupportedContractType(contract_type).into());
        }
        let violations = validate_deliverables(contract_type, &deliverables);
        if !violations.is_empty() {
            return Err(PactError::Validation(violations));
        }
        deliverables.sort_by_key(|d| d.number);
        for d in &mut deliverables {
            d.options.sort_by_key(|o| o.number);
        }
        Ok(Catalog {
            contract_type,
            deliverables,
        })
    }

    pub fn deliverable(&self, deliverable_id: &str) -> Option<&Deliverable> {
        self.deliverables.iter().find(|d| d.id == deliverable_id)
    }

    pub fn deliverable_ids(&self) -> impl Iterator<Item = &str> {
        self.deliverables.iter().map(|d| d.id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.deliverables.is_empty()
    }
}

fn validate_deliverables(contract_type: ContractType, deliverables: &[Deliverable]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut ids = BTreeSet::new();
    let mut numbers = BTreeSet::new();

    for d in deliverables {
        if d.contract_type != contract_type {
            violations.push(Violation::deliverable(
                &d.id,
                "contract_type",
                format!("belongs to '{}', not '{}'", d.contract_type, contract_type),
            ));
        }
        if !ids.insert(d.id.as_str()) {
            violations.push(Violation::deliverable(&d.id, "id", "duplicate deliverable id"));
        }
        if !numbers.insert(d.number) {
            violations.push(Violation::deliverable(
                &d.id,
                "number",
                format!("duplicate deliverable number {}", d.number),
            ));
        }
        if d.title.is_blank() {
            violations.push(Violation::deliverable(&d.id, "title", "both languages required"));
        }
        if d.options.is_empty() {
            violations.push(Violation::deliverable(&d.id, "options", "at least one option required"));
        }

        let mut option_ids = BTreeSet::new();
        let mut option_numbers = BTreeSet::new();
        for o in &d.options {
            if !option_ids.insert(o.id.as_str()) {
                violations.push(Violation::deliverable(
                    &d.id,
                    "options",
                    format!("duplicate option id '{}'", o.id),
                ));
            }
            if !option_numbers.insert(o.number) {
                violations.push(Violation::deliverable(
                    &d.id,
                    "options",
                    format!("duplicate option number {}", o.number),
                ));
            }
            if let Some(t) = &o.target {
                if !is_percentage(t.baseline) || !is_percentage(t.target) {
                    violations.push(Violation::deliverable(
                        &d.id,
                        "options",
                        format!("option '{}' baseline/target must be within [0, 100]", o.id),
                    ));
                }
            }
        }
    }
    violations
}

/// Whether `value` lies in the closed percentage range [0, 100].
pub fn is_percentage(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str, number: u32) -> DeliverableOption {
        DeliverableOption {
            id: id.into(),
            number,
            text: BilingualText::new(format!("option {id}"), format!("option {id}")),
            target: None,
        }
    }

    fn deliverable(id: &str, number: u32, options: Vec<DeliverableOption>) -> Deliverable {
        Deliverable {
            id: id.into(),
            contract_type: ContractType::Full,
            number,
            title: BilingualText::new(id, id),
            timeline: "2024-2025".into(),
            activity: None,
            options,
        }
    }

    #[test]
    fn catalog_orders_by_number() {
        let catalog = Catalog::new(
            ContractType::Full,
            vec![
                deliverable("d2", 2, vec![option("d2o2", 2), option("d2o1", 1)]),
                deliverable("d1", 1, vec![option("d1o1", 1)]),
            ],
        )
        .unwrap();
        let ids: Vec<_> = catalog.deliverable_ids().collect();
        assert_eq!(ids, vec!["d1", "d2"]);
        assert_eq!(catalog.deliverables[1].options[0].id, "d2o1");
    }

    #[test]
    fn unsupported_contract_type_rejected() {
        let err = Catalog::new(ContractType::Limited, vec![]).unwrap_err();
        assert_eq!(
            err,
            PactError::NotFound(NotFound::UnsupportedContractType(ContractType::Limited))
        );
    }

    #[test]
    fn empty_supported_catalog_is_not_an_error() {
        let catalog = Catalog::new(ContractType::Partial, vec![]).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn every_structural_problem_reported() {
        let mut wrong_type = deliverable("d3", 3, vec![option("x", 1)]);
        wrong_type.contract_type = ContractType::Partial;
        let err = Catalog::new(
            ContractType::Full,
            vec![
                deliverable("d1", 1, vec![option("a", 1), option("a", 1)]),
                deliverable("d2", 1, vec![]),
                wrong_type,
            ],
        )
        .unwrap_err();
        let PactError::Validation(violations) = err else {
            panic!("expected validation error");
        };
        // duplicate option id + number on d1, duplicate number + no options on d2, type on d3
        assert_eq!(violations.len(), 5);
    }
}
