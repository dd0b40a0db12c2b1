//! Indicators and the threshold rules that turn a reported baseline into a target.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::BilingualText;
use crate::partner::ContractType;

/// Number of rules every indicator carries.
pub const RULE_COUNT: usize = 3;

/// Whether a higher or a lower value is the improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Increase,
    /// Lower is better.
    Reduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    LessThan,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    GreaterThan,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::GreaterThan => ">",
        }
    }
}

/// `baseline <comparison> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub comparison: Comparison,
    pub threshold: Decimal,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "baseline {} {}", self.comparison.symbol(), self.threshold)
    }
}

/// What a matching rule does to the baseline.
///
/// Decided once when the rule is authored; "by" variants are deltas applied to
/// the reported baseline, "to" variants are absolute targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum RuleOutcome {
    IncreaseBy(Decimal),
    IncreaseTo(Decimal),
    DecreaseBy(Decimal),
    DecreaseTo(Decimal),
    Maintain,
}

impl RuleOutcome {
    /// Whether this outcome may appear on an indicator with `direction`.
    pub fn fits(self, direction: Direction) -> bool {
        match self {
            RuleOutcome::IncreaseBy(_) | RuleOutcome::IncreaseTo(_) => {
                direction == Direction::Increase
            }
            RuleOutcome::DecreaseBy(_) | RuleOutcome::DecreaseTo(_) => {
                direction == Direction::Reduction
            }
            RuleOutcome::Maintain => true,
        }
    }

    pub fn amount(self) -> Option<Decimal> {
        match self {
            RuleOutcome::IncreaseBy(n)
            | RuleOutcome::IncreaseTo(n)
            | RuleOutcome::DecreaseBy(n)
            | RuleOutcome::DecreaseTo(n) => Some(n),
            RuleOutcome::Maintain => None,
        }
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::IncreaseBy(n) => write!(f, "increase by {}", n),
            RuleOutcome::IncreaseTo(n) => write!(f, "increase to {}", n),
            RuleOutcome::DecreaseBy(n) => write!(f, "decrease by {}", n),
            RuleOutcome::DecreaseTo(n) => write!(f, "decrease to {}", n),
            RuleOutcome::Maintain => f.write_str("maintain"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRule {
    pub condition: Condition,
    pub outcome: RuleOutcome,
    pub description: BilingualText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: String,
    pub contract_type: ContractType,
    pub name: BilingualText,
    /// Reference baseline the rules were authored against.
    pub baseline: Decimal,
    #[serde(default)]
    pub direction: Direction,
    /// Evaluated in order; the first matching rule wins.
    pub rules: Vec<CalculationRule>,
}
