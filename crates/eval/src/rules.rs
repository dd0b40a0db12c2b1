//! Ordered first-match evaluation of an indicator's calculation rules.
//!
//! Rules are not commutative: they are tried in the order they are defined
//! and the first rule whose condition holds for the reported baseline wins.
//! Overlapping ranges are allowed only in that deliberate order.

use rust_decimal::Decimal;
use serde::Serialize;

use pact_core::catalog::is_percentage;
use pact_core::{CalculationRule, Indicator, PactError, Violation};

use crate::numeric::{apply_outcome, compare, normalize};

/// Result of evaluating one indicator against a reported baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub indicator_id: String,
    pub reported_baseline: Decimal,
    pub target: Decimal,
    /// 1-based position of the matched rule.
    pub matched_rule: usize,
    pub rule: CalculationRule,
    pub explanation: String,
}

/// Evaluate `indicator` for `reported_baseline`.
///
/// The baseline is normalized to one decimal place once; that value both
/// selects the rule and feeds its outcome. Fails with `PactError::Validation`
/// when the baseline is not a percentage or when the computed target falls
/// outside [0, 100] (targets are never clamped), and with
/// `PactError::NoMatchingRule` when no rule covers the baseline. A missing
/// target is never guessed.
pub fn evaluate(indicator: &Indicator, reported_baseline: Decimal) -> Result<Evaluation, PactError> {
    if !is_percentage(reported_baseline) {
        return Err(PactError::Validation(vec![Violation::field(
            "baseline",
            format!("{} is outside [0, 100]", reported_baseline),
        )]));
    }
    let baseline = normalize(reported_baseline);

    let (index, rule) = matching_rule(indicator, baseline).ok_or_else(|| {
        PactError::NoMatchingRule {
            indicator_id: indicator.id.clone(),
            baseline: reported_baseline,
        }
    })?;

    let target = apply_outcome(baseline, rule.outcome)?;
    if !is_percentage(target) {
        return Err(PactError::Validation(vec![Violation::field(
            "target",
            format!(
                "rule {} of indicator '{}' gives {} for baseline {}, outside [0, 100]",
                index + 1,
                indicator.id,
                target,
                baseline
            ),
        )]));
    }
    let explanation = format!(
        "baseline {} matched rule {} ({}): {} -> target {}",
        baseline,
        index + 1,
        rule.condition,
        rule.outcome,
        target
    );

    Ok(Evaluation {
        indicator_id: indicator.id.clone(),
        reported_baseline,
        target,
        matched_rule: index + 1,
        rule: rule.clone(),
        explanation,
    })
}

/// First rule (with its 0-based index) whose condition holds for `baseline`.
pub fn matching_rule(indicator: &Indicator, baseline: Decimal) -> Option<(usize, &CalculationRule)> {
    indicator.rules.iter().enumerate().find(|(_, rule)| {
        compare(baseline, rule.condition.comparison, rule.condition.threshold)
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use pact_core::{
        BilingualText, Comparison, Condition, ContractType, Direction, RuleOutcome,
    };

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rule(comparison: Comparison, threshold: &str, outcome: RuleOutcome) -> CalculationRule {
        CalculationRule {
            condition: Condition {
                comparison,
                threshold: dec(threshold),
            },
            outcome,
            description: BilingualText::new("rule", "règle"),
        }
    }

    fn increase_indicator() -> Indicator {
        Indicator {
            id: "ind-completion".into(),
            contract_type: ContractType::Full,
            name: BilingualText::new("Completion rate", "Taux d'achèvement"),
            baseline: dec("93.7"),
            direction: Direction::Increase,
            rules: vec![
                rule(Comparison::LessThan, "93.7", RuleOutcome::IncreaseBy(dec("1.3"))),
                rule(Comparison::Equal, "93.7", RuleOutcome::IncreaseTo(dec("95"))),
                rule(Comparison::GreaterOrEqual, "95", RuleOutcome::Maintain),
            ],
        }
    }

    fn reduction_indicator() -> Indicator {
        Indicator {
            id: "ind-wait".into(),
            contract_type: ContractType::Partial,
            name: BilingualText::new("Wait share", "Part d'attente"),
            baseline: dec("51"),
            direction: Direction::Reduction,
            rules: vec![
                rule(Comparison::GreaterThan, "51", RuleOutcome::DecreaseBy(dec("5"))),
                rule(Comparison::Equal, "51", RuleOutcome::DecreaseTo(dec("46"))),
                rule(Comparison::LessOrEqual, "46", RuleOutcome::Maintain),
            ],
        }
    }

    #[test]
    fn equal_to_threshold_raises_to_cap() {
        let e = evaluate(&increase_indicator(), dec("93.7")).unwrap();
        assert_eq!(e.matched_rule, 2);
        assert_eq!(e.target, dec("95"));
    }

    #[test]
    fn below_threshold_increases_by_delta() {
        let e = evaluate(&increase_indicator(), dec("93.6")).unwrap();
        assert_eq!(e.matched_rule, 1);
        assert_eq!(e.target, dec("94.9"));
    }

    #[test]
    fn at_or_above_cap_maintains() {
        for b in ["95", "96"] {
            let e = evaluate(&increase_indicator(), dec(b)).unwrap();
            assert_eq!(e.matched_rule, 3);
            assert_eq!(e.target, dec(b));
        }
    }

    #[test]
    fn reduction_indicator_targets() {
        let ind = reduction_indicator();
        assert_eq!(evaluate(&ind, dec("51")).unwrap().target, dec("46"));
        assert_eq!(evaluate(&ind, dec("60")).unwrap().target, dec("55"));
        let maintained = evaluate(&ind, dec("40")).unwrap();
        assert_eq!(maintained.matched_rule, 3);
        assert_eq!(maintained.target, dec("40"));
    }

    #[test]
    fn uncovered_baseline_fails_instead_of_guessing() {
        let err = evaluate(&increase_indicator(), dec("94")).unwrap_err();
        assert_eq!(
            err,
            PactError::NoMatchingRule {
                indicator_id: "ind-completion".into(),
                baseline: dec("94"),
            }
        );
        assert!(matches!(
            evaluate(&reduction_indicator(), dec("48")),
            Err(PactError::NoMatchingRule { .. })
        ));
    }

    #[test]
    fn first_match_wins_for_overlapping_rules() {
        let mut ind = increase_indicator();
        ind.rules[1] = rule(Comparison::LessOrEqual, "100", RuleOutcome::IncreaseTo(dec("99")));
        // 93.6 satisfies both rule 1 and the widened rule 2; rule 1 is defined first.
        assert_eq!(evaluate(&ind, dec("93.6")).unwrap().matched_rule, 1);
    }

    #[test]
    fn baseline_must_be_a_percentage() {
        assert!(matches!(
            evaluate(&increase_indicator(), dec("100.5")),
            Err(PactError::Validation(_))
        ));
    }

    #[test]
    fn explanation_names_rule_and_target() {
        let e = evaluate(&increase_indicator(), dec("93.6")).unwrap();
        assert_eq!(
            e.explanation,
            "baseline 93.6 matched rule 1 (baseline < 93.7): increase by 1.3 -> target 94.9"
        );
    }
}
