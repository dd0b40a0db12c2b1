//! pact-core: domain model of the performance agreement engine.
//!
//! Holds the partner lifecycle states, the deliverable catalog shape, the
//! selection ledger's validation and completeness rules, reconfiguration
//! requests, indicators with their calculation rules, and the error taxonomy
//! shared by every crate in the workspace. No I/O happens here.
//!
//! # Public API
//!
//! - [`Partner`], [`LifecycleState`], [`ContractType`], [`Principal`]
//! - [`Catalog`], [`Deliverable`], [`DeliverableOption`]
//! - [`ValidatedSelections`], [`Selection`], [`missing_deliverables`]
//! - [`ReconfigurationRequest`], [`AdminScope`]
//! - [`Indicator`], [`CalculationRule`], [`RuleOutcome`]
//! - [`PactError`], [`Violation`], [`NotFound`]

pub mod catalog;
pub mod error;
pub mod indicator;
pub mod partner;
pub mod reconfiguration;
pub mod selection;

use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Current UTC time as an RFC 3339 timestamp.
pub fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

// ── Convenience re-exports ───────────────────────────────────────────

pub use catalog::{BilingualText, Catalog, Deliverable, DeliverableOption, OptionTarget};
pub use error::{NotFound, PactError, Violation};
pub use indicator::{
    CalculationRule, Comparison, Condition, Direction, Indicator, RuleOutcome, RULE_COUNT,
};
pub use partner::{
    ContractType, FinalSignature, LifecycleState, Partner, PartnerStatus, Principal, Role,
};
pub use reconfiguration::{AdminScope, ReconfigurationRequest, RequestStatus};
pub use selection::{
    missing_deliverables, resolve_selections, BaselineCapture, BaselineInput, Selection,
    SelectionInput, SelectionView, ValidatedSelection, ValidatedSelections,
};
