use pact_core::{Indicator, Partner};
use serde::{Deserialize, Serialize};

/// A partner's lifecycle state as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRecord {
    pub partner: Partner,
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// An indicator definition with its rule-set version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub indicator: Indicator,
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}
