//! Indicator rule evaluator -- turns a partner-reported baseline into a
//! target using an indicator's ordered threshold rules.
//!
//! The evaluator is pure: it takes an [`Indicator`](pact_core::Indicator)
//! and a baseline, and returns an [`Evaluation`] with the matched rule and a
//! human-readable explanation. Rule sets are validated when authored
//! ([`authoring`]), not re-interpreted per evaluation.

pub mod authoring;
pub mod numeric;
pub mod rules;

pub use authoring::{coverage_gaps, validate_indicator, validate_rules, CoverageGap};
pub use rules::{evaluate, matching_rule, Evaluation};
