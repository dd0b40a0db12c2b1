//! Fixed-decimal numeric model for indicator percentages.
//!
//! All arithmetic uses `rust_decimal::Decimal` with
//! `RoundingStrategy::MidpointNearestEven`. No `f64` anywhere in the
//! evaluation path. Comparisons happen at one decimal place so that a
//! reported 93.70 equals a threshold of 93.7.

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

use pact_core::{Comparison, PactError, RuleOutcome, Violation};

/// Decimal places used for threshold comparison and for computed targets.
pub const PERCENT_SCALE: u32 = 1;

/// Round a percentage to [`PERCENT_SCALE`] decimal places.
pub fn normalize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Compare `left <comparison> right` after normalizing both sides.
pub fn compare(left: Decimal, comparison: Comparison, right: Decimal) -> bool {
    let l = normalize(left);
    let r = normalize(right);
    match comparison {
        Comparison::LessThan => l < r,
        Comparison::LessOrEqual => l <= r,
        Comparison::Equal => l == r,
        Comparison::GreaterOrEqual => l >= r,
        Comparison::GreaterThan => l > r,
    }
}

/// Apply a rule outcome to a baseline, returning the normalized target.
pub fn apply_outcome(baseline: Decimal, outcome: RuleOutcome) -> Result<Decimal, PactError> {
    let raw = match outcome {
        RuleOutcome::IncreaseBy(n) => baseline.checked_add(n).ok_or_else(|| overflow("addition"))?,
        RuleOutcome::DecreaseBy(n) => {
            baseline.checked_sub(n).ok_or_else(|| overflow("subtraction"))?
        }
        RuleOutcome::IncreaseTo(n) | RuleOutcome::DecreaseTo(n) => n,
        RuleOutcome::Maintain => baseline,
    };
    Ok(normalize(raw))
}

fn overflow(op: &str) -> PactError {
    PactError::Validation(vec![Violation::field(
        "baseline",
        format!("{} overflow while computing target", op),
    )])
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn normalize_rounds_midpoint_nearest_even() {
        assert_eq!(normalize(dec("93.65")), dec("93.6"));
        assert_eq!(normalize(dec("93.75")), dec("93.8"));
        assert_eq!(normalize(dec("93.749")), dec("93.7"));
    }

    #[test]
    fn equality_at_one_decimal_place() {
        assert!(compare(dec("93.70"), Comparison::Equal, dec("93.7")));
        assert!(compare(dec("93.72"), Comparison::Equal, dec("93.7")));
        assert!(!compare(dec("93.6"), Comparison::Equal, dec("93.7")));
    }

    #[test]
    fn ordering_comparisons() {
        assert!(compare(dec("93.6"), Comparison::LessThan, dec("93.7")));
        assert!(!compare(dec("93.7"), Comparison::LessThan, dec("93.7")));
        assert!(compare(dec("95"), Comparison::GreaterOrEqual, dec("95")));
        assert!(compare(dec("46"), Comparison::LessOrEqual, dec("46.0")));
        assert!(compare(dec("51.1"), Comparison::GreaterThan, dec("51")));
    }

    #[test]
    fn outcomes_are_distinct() {
        let base = dec("93.6");
        assert_eq!(apply_outcome(base, RuleOutcome::IncreaseBy(dec("1.3"))).unwrap(), dec("94.9"));
        assert_eq!(apply_outcome(base, RuleOutcome::IncreaseTo(dec("95"))).unwrap(), dec("95"));
        assert_eq!(apply_outcome(dec("60"), RuleOutcome::DecreaseBy(dec("5"))).unwrap(), dec("55"));
        assert_eq!(apply_outcome(dec("51"), RuleOutcome::DecreaseTo(dec("46"))).unwrap(), dec("46"));
        assert_eq!(apply_outcome(base, RuleOutcome::Maintain).unwrap(), base);
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let result = apply_outcome(Decimal::MAX, RuleOutcome::IncreaseBy(Decimal::ONE));
        assert!(matches!(result, Err(PactError::Validation(_))));
    }
}
