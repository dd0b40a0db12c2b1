use std::str::FromStr;
use std::sync::Arc;

use pact_core::{CalculationRule, ContractType, Indicator, NotFound, PactError, Principal};
use pact_executor::{Executor, ExecutorSettings};
use pact_storage::MemoryStorage;
use rust_decimal::Decimal;
use serde_json::json;

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

fn completion_rate() -> Indicator {
    serde_json::from_value(json!({
        "id": "completion",
        "contract_type": "full",
        "name": { "primary": "Completion rate", "secondary": "Taux d'achèvement" },
        "baseline": "93.7",
        "direction": "increase",
        "rules": [
            rule("less_than", "93.7", json!({ "kind": "increase_by", "amount": "1.3" })),
            rule("equal", "93.7", json!({ "kind": "increase_to", "amount": "95" })),
            rule("greater_or_equal", "95", json!({ "kind": "maintain" })),
        ]
    }))
    .unwrap()
}

fn covering_rules() -> Vec<CalculationRule> {
    serde_json::from_value(json!([
        rule("less_than", "93.7", json!({ "kind": "increase_by", "amount": "1.3" })),
        rule("less_than", "95", json!({ "kind": "increase_to", "amount": "95" })),
        rule("greater_or_equal", "95", json!({ "kind": "maintain" })),
    ]))
    .unwrap()
}

async fn engine() -> Executor<MemoryStorage> {
    let ex = Executor::new(Arc::new(MemoryStorage::new()), ExecutorSettings::default());
    ex.register_indicator(&completion_rate()).await.unwrap();
    ex
}

#[tokio::test]
async fn evaluates_the_first_matching_rule() {
    let ex = engine().await;
    assert_eq!(
        ex.evaluate_indicator("completion", dec("92")).await.unwrap().target,
        dec("93.3")
    );
    let at_baseline = ex.evaluate_indicator("completion", dec("93.7")).await.unwrap();
    assert_eq!(at_baseline.target, dec("95"));
    assert_eq!(at_baseline.matched_rule, 2);
    assert_eq!(
        ex.evaluate_indicator("completion", dec("97.2")).await.unwrap().target,
        dec("97.2")
    );
}

#[tokio::test]
async fn uncovered_baseline_is_reported_not_guessed() {
    let ex = engine().await;
    let err = ex
        .evaluate_indicator("completion", dec("94.1"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PactError::NoMatchingRule {
            indicator_id: "completion".into(),
            baseline: dec("94.1"),
        }
    );
}

#[tokio::test]
async fn unknown_indicator_is_not_found() {
    let ex = engine().await;
    assert_eq!(
        ex.evaluate_indicator("nope", dec("50")).await.unwrap_err(),
        PactError::NotFound(NotFound::Indicator("nope".into()))
    );
}

#[tokio::test]
async fn patched_rules_apply_to_later_evaluations() {
    let ex = engine().await;
    let before = ex.get_indicator("completion").await.unwrap().version;

    let record = ex
        .patch_rules(&Principal::admin("admin-1"), "completion", covering_rules())
        .await
        .unwrap();
    assert_eq!(record.version, before + 1);
    assert_eq!(
        ex.evaluate_indicator("completion", dec("94.1")).await.unwrap().target,
        dec("95")
    );
}

#[tokio::test]
async fn patch_rejects_outcomes_against_the_direction() {
    let ex = engine().await;
    let mut rules = covering_rules();
    rules[2] = serde_json::from_value(rule(
        "greater_or_equal",
        "95",
        json!({ "kind": "decrease_by", "amount": "1" }),
    ))
    .unwrap();

    let err = ex
        .patch_rules(&Principal::admin("admin-1"), "completion", rules)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(ex.get_indicator("completion").await.unwrap().version, 0);
}

#[tokio::test]
async fn patch_requires_admin() {
    let ex = engine().await;
    let err = ex
        .patch_rules(&Principal::partner("p-1"), "completion", covering_rules())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "permission");
}

#[tokio::test]
async fn indicators_listed_by_contract_type() {
    let ex = engine().await;
    assert_eq!(ex.list_indicators(Some(ContractType::Full)).await.unwrap().len(), 1);
    assert!(ex
        .list_indicators(Some(ContractType::Partial))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn registering_an_invalid_indicator_fails() {
    let ex = Executor::new(Arc::new(MemoryStorage::new()), ExecutorSettings::default());
    let mut indicator = completion_rate();
    indicator.rules.pop();
    assert_eq!(
        ex.register_indicator(&indicator).await.unwrap_err().kind(),
        "validation"
    );
}
