//! Indicator rule regression suite.
//!
//! Each test deserializes an indicator from the same JSON shape the seed
//! files and the admin API use, then evaluates reported baselines against
//! it. Organized by category:
//!   A. Increase indicators
//!   B. Reduction indicators and target range
//!   C. Decimal precision at the comparison boundary
//!   D. Authoring validation

use std::str::FromStr;

use pact_core::{Indicator, PactError};
use pact_eval::{coverage_gaps, evaluate, validate_indicator};
use rust_decimal::Decimal;
use serde_json::json;

// ──────────────────────────────────────────────
// Test helpers
// ──────────────────────────────────────────────

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn rule(comparison: &str, threshold: &str, outcome: serde_json::Value) -> serde_json::Value {
    json!({
        "condition": { "comparison": comparison, "threshold": threshold },
        "outcome": outcome,
        "description": { "primary": "rule", "secondary": "règle" }
    })
}

fn indicator(direction: &str, baseline: &str, rules: Vec<serde_json::Value>) -> Indicator {
    serde_json::from_value(json!({
        "id": "ind",
        "contract_type": "full",
        "name": { "primary": "Indicator", "secondary": "Indicateur" },
        "baseline": baseline,
        "direction": direction,
        "rules": rules
    }))
    .expect("indicator fixture must deserialize")
}

fn completion_rate() -> Indicator {
    indicator(
        "increase",
        "93.7",
        vec![
            rule("less_than", "93.7", json!({ "kind": "increase_by", "amount": "1.3" })),
            rule("equal", "93.7", json!({ "kind": "increase_to", "amount": "95" })),
            rule("greater_or_equal", "95", json!({ "kind": "maintain" })),
        ],
    )
}

fn wait_share() -> Indicator {
    indicator(
        "reduction",
        "51",
        vec![
            rule("greater_than", "51", json!({ "kind": "decrease_by", "amount": "5" })),
            rule("equal", "51", json!({ "kind": "decrease_to", "amount": "46" })),
            rule("less_or_equal", "46", json!({ "kind": "maintain" })),
        ],
    )
}

fn target(ind: &Indicator, baseline: &str) -> Decimal {
    evaluate(ind, dec(baseline)).unwrap().target
}

// ──────────────────────────────────────────────
// A. Increase indicators
// ──────────────────────────────────────────────

#[test]
fn a1_equal_selects_second_rule() {
    let e = evaluate(&completion_rate(), dec("93.7")).unwrap();
    assert_eq!(e.matched_rule, 2);
    assert_eq!(e.target, dec("95"));
}

#[test]
fn a2_below_selects_first_rule() {
    let e = evaluate(&completion_rate(), dec("93.6")).unwrap();
    assert_eq!(e.matched_rule, 1);
    assert_eq!(e.target, dec("94.9"));
}

#[test]
fn a3_at_cap_maintains() {
    assert_eq!(target(&completion_rate(), "95"), dec("95"));
}

#[test]
fn a4_above_cap_maintains() {
    assert_eq!(target(&completion_rate(), "96"), dec("96"));
}

#[test]
fn a5_low_baseline_adds_delta() {
    assert_eq!(target(&completion_rate(), "12.4"), dec("13.7"));
}

// ──────────────────────────────────────────────
// B. Reduction indicators
// ──────────────────────────────────────────────

#[test]
fn b1_equal_reduces_to_absolute() {
    assert_eq!(target(&wait_share(), "51"), dec("46"));
}

#[test]
fn b2_above_subtracts_delta() {
    assert_eq!(target(&wait_share(), "60"), dec("55"));
}

#[test]
fn b3_at_floor_maintains() {
    assert_eq!(target(&wait_share(), "40"), dec("40"));
    assert_eq!(target(&wait_share(), "46"), dec("46"));
}

#[test]
fn b4_gap_between_rules_is_an_error() {
    let err = evaluate(&wait_share(), dec("48.2")).unwrap_err();
    assert!(matches!(err, PactError::NoMatchingRule { .. }));
    assert_eq!(err.kind(), "no_matching_rule");
}

#[test]
fn b5_target_below_zero_is_refused() {
    let ind = indicator(
        "reduction",
        "4",
        vec![
            rule("greater_than", "4", json!({ "kind": "decrease_by", "amount": "5" })),
            rule("equal", "4", json!({ "kind": "decrease_to", "amount": "2" })),
            rule("less_or_equal", "2", json!({ "kind": "maintain" })),
        ],
    );
    assert!(validate_indicator(&ind).is_ok());

    let Err(PactError::Validation(violations)) = evaluate(&ind, dec("4.5")) else {
        panic!("expected a validation error for a negative target");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field.as_deref(), Some("target"));
    assert!(violations[0].message.contains("-0.5"));

    assert_eq!(target(&ind, "4"), dec("2"));
}

// ──────────────────────────────────────────────
// C. Precision at the comparison boundary
// ──────────────────────────────────────────────

#[test]
fn c1_trailing_zeros_are_equal() {
    assert_eq!(evaluate(&completion_rate(), dec("93.70")).unwrap().matched_rule, 2);
}

#[test]
fn c2_second_decimal_rounds_before_comparison() {
    // 93.74 compares as 93.7 and hits the equality rule.
    assert_eq!(evaluate(&completion_rate(), dec("93.74")).unwrap().matched_rule, 2);
    // 93.66 compares as 93.7 as well.
    assert_eq!(evaluate(&completion_rate(), dec("93.66")).unwrap().matched_rule, 2);
    // 93.64 compares as 93.6 and stays below.
    assert_eq!(evaluate(&completion_rate(), dec("93.64")).unwrap().matched_rule, 1);
}

#[test]
fn c3_targets_rounded_to_one_place() {
    assert_eq!(target(&completion_rate(), "93.64").to_string(), "94.9");
}

#[test]
fn c4_rounded_baseline_drives_rule_and_outcome() {
    // 93.65 rounds half-to-even to 93.6: rule 1 matches and adds 1.3 to 93.6.
    let e = evaluate(&completion_rate(), dec("93.65")).unwrap();
    assert_eq!(e.matched_rule, 1);
    assert_eq!(e.target, dec("94.9"));
    assert_eq!(e.reported_baseline, dec("93.65"));
    assert_eq!(
        e.explanation,
        "baseline 93.6 matched rule 1 (baseline < 93.7): increase by 1.3 -> target 94.9"
    );
}

#[test]
fn c5_numeric_json_baseline_accepted() {
    let ind: Indicator = serde_json::from_value(json!({
        "id": "n",
        "contract_type": "partial",
        "name": { "primary": "n", "secondary": "n" },
        "baseline": 51,
        "direction": "reduction",
        "rules": [
            rule("greater_than", "51", json!({ "kind": "decrease_by", "amount": "5" })),
            rule("equal", "51", json!({ "kind": "decrease_to", "amount": "46" })),
            rule("less_or_equal", "46", json!({ "kind": "maintain" })),
        ]
    }))
    .unwrap();
    assert_eq!(ind.baseline, dec("51"));
}

// ──────────────────────────────────────────────
// D. Authoring validation
// ──────────────────────────────────────────────

#[test]
fn d1_fixtures_are_valid() {
    assert!(validate_indicator(&completion_rate()).is_ok());
    assert!(validate_indicator(&wait_share()).is_ok());
}

#[test]
fn d2_wrong_direction_rejected() {
    let ind = indicator(
        "reduction",
        "51",
        vec![
            rule("greater_than", "51", json!({ "kind": "increase_by", "amount": "5" })),
            rule("equal", "51", json!({ "kind": "decrease_to", "amount": "46" })),
            rule("less_or_equal", "46", json!({ "kind": "maintain" })),
        ],
    );
    let Err(PactError::Validation(violations)) = validate_indicator(&ind) else {
        panic!("expected validation error");
    };
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field.as_deref(), Some("rules[0].outcome"));
}

#[test]
fn d3_coverage_gaps_reported() {
    let gaps = coverage_gaps(&wait_share());
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].from, dec("46.1"));
    assert_eq!(gaps[0].to, dec("50.9"));
}
