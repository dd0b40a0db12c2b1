//! Authoring-time checks for indicator rule sets.
//!
//! Rule sets are validated once when they are written, so evaluation never
//! has to re-derive what a rule means.

use rust_decimal::Decimal;
use serde::Serialize;

use pact_core::catalog::is_percentage;
use pact_core::{CalculationRule, Direction, Indicator, PactError, RuleOutcome, Violation, RULE_COUNT};

use crate::numeric::PERCENT_SCALE;
use crate::rules::matching_rule;

/// Check a rule set for an indicator with `direction`, reporting every problem.
pub fn validate_rules(direction: Direction, rules: &[CalculationRule]) -> Vec<Violation> {
    let mut violations = Vec::new();

    if rules.len() != RULE_COUNT {
        violations.push(Violation::field(
            "rules",
            format!("expected exactly {} rules, got {}", RULE_COUNT, rules.len()),
        ));
    }

    for (i, rule) in rules.iter().enumerate() {
        let field = |name: &str| format!("rules[{}].{}", i, name);

        if !is_percentage(rule.condition.threshold) {
            violations.push(Violation::field(
                &field("condition"),
                format!("threshold {} is outside [0, 100]", rule.condition.threshold),
            ));
        }

        if !rule.outcome.fits(direction) {
            violations.push(Violation::field(
                &field("outcome"),
                format!(
                    "'{}' is not allowed on a {} indicator",
                    rule.outcome,
                    match direction {
                        Direction::Increase => "increase",
                        Direction::Reduction => "reduction",
                    }
                ),
            ));
        }

        if let Some(amount) = rule.outcome.amount() {
            let absolute = matches!(
                rule.outcome,
                RuleOutcome::IncreaseTo(_) | RuleOutcome::DecreaseTo(_)
            );
            if amount < Decimal::ZERO {
                violations.push(Violation::field(&field("outcome"), "amount must not be negative"));
            } else if absolute && !is_percentage(amount) {
                violations.push(Violation::field(
                    &field("outcome"),
                    format!("absolute target {} is outside [0, 100]", amount),
                ));
            }
        }

        if rule.description.is_blank() {
            violations.push(Violation::field(&field("description"), "both languages required"));
        }
    }

    violations
}

/// Validate a whole indicator definition.
pub fn validate_indicator(indicator: &Indicator) -> Result<(), PactError> {
    let mut violations = Vec::new();
    if indicator.name.is_blank() {
        violations.push(Violation::field("name", "both languages required"));
    }
    if !is_percentage(indicator.baseline) {
        violations.push(Violation::field(
            "baseline",
            format!("{} is outside [0, 100]", indicator.baseline),
        ));
    }
    violations.extend(validate_rules(indicator.direction, &indicator.rules));
    if violations.is_empty() {
        Ok(())
    } else {
        Err(PactError::Validation(violations))
    }
}

/// A closed range of baselines no rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoverageGap {
    pub from: Decimal,
    pub to: Decimal,
}

/// Baselines in [0, 100] (at one decimal place) that no rule covers.
///
/// Gaps are legal: evaluation inside one fails with `NoMatchingRule`. This is
/// a diagnostic for rule authors.
pub fn coverage_gaps(indicator: &Indicator) -> Vec<CoverageGap> {
    let mut gaps = Vec::new();
    let mut open: Option<CoverageGap> = None;

    for tenth in 0..=1000i64 {
        let value = Decimal::new(tenth, PERCENT_SCALE);
        if matching_rule(indicator, value).is_some() {
            if let Some(gap) = open.take() {
                gaps.push(gap);
            }
        } else {
            match open.as_mut() {
                Some(gap) => gap.to = value,
                None => open = Some(CoverageGap { from: value, to: value }),
            }
        }
    }
    gaps.extend(open);
    gaps
}
