use serde::{Deserialize, Serialize};

use crate::partner::{ContractType, LifecycleState};

/// A single validation failure.
///
/// Validation never stops at the first failure: every violation found in a
/// payload is reported so the caller can correct the whole request at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliverable_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(
        deliverable_id: Option<&str>,
        field: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Violation {
            deliverable_id: deliverable_id.map(str::to_owned),
            field: field.map(str::to_owned),
            message: message.into(),
        }
    }

    /// A violation scoped to one deliverable of the payload.
    pub fn deliverable(deliverable_id: &str, field: &str, message: impl Into<String>) -> Self {
        Violation::new(Some(deliverable_id), Some(field), message)
    }

    /// A violation on a top-level field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Violation::new(None, Some(field), message)
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.deliverable_id, &self.field) {
            (Some(d), Some(field)) => write!(f, "{}.{}: {}", d, field, self.message),
            (Some(d), None) => write!(f, "{}: {}", d, self.message),
            (None, Some(field)) => write!(f, "{}: {}", field, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// What could not be found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFound {
    #[error("partner '{0}' not found")]
    Partner(String),
    #[error("deliverable '{0}' not found")]
    Deliverable(String),
    #[error("option '{option_id}' not found on deliverable '{deliverable_id}'")]
    Option {
        deliverable_id: String,
        option_id: String,
    },
    #[error("indicator '{0}' not found")]
    Indicator(String),
    #[error("reconfiguration request '{0}' not found")]
    ReconfigurationRequest(String),
    #[error("unknown contract type '{0}'")]
    UnknownContractType(String),
    /// The contract type exists but carries no configurable deliverables.
    #[error("contract type '{0}' has no configurable deliverables")]
    UnsupportedContractType(ContractType),
}

/// Error taxonomy shared by every agreement operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PactError {
    #[error("validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    #[error("illegal transition '{action}' from state {state}: {reason}")]
    StateConflict {
        action: String,
        state: LifecycleState,
        reason: String,
    },

    #[error("partner '{partner_id}' already has pending reconfiguration request '{request_id}'")]
    DuplicateRequest {
        partner_id: String,
        request_id: String,
    },

    #[error(transparent)]
    NotFound(#[from] NotFound),

    #[error("role '{role}' may not {action}")]
    Permission { role: String, action: String },

    #[error("configuration incomplete, missing deliverables: {}", .missing.join(", "))]
    IncompleteConfiguration { missing: Vec<String> },

    /// Internal rule-coverage gap. Never shown to partners.
    #[error("no rule of indicator '{indicator_id}' matches baseline {baseline}")]
    NoMatchingRule {
        indicator_id: String,
        baseline: rust_decimal::Decimal,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl PactError {
    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            PactError::Validation(_) => "validation",
            PactError::StateConflict { .. } => "state_conflict",
            PactError::DuplicateRequest { .. } => "duplicate_request",
            PactError::NotFound(_) => "not_found",
            PactError::Permission { .. } => "permission",
            PactError::IncompleteConfiguration { .. } => "incomplete_configuration",
            PactError::NoMatchingRule { .. } => "no_matching_rule",
            PactError::Persistence(_) => "persistence",
        }
    }

    /// Whether the caller can fix the request and try again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PactError::Validation(_)
                | PactError::StateConflict { .. }
                | PactError::IncompleteConfiguration { .. }
                | PactError::Persistence(_)
        )
    }

    pub fn state_conflict(
        action: &str,
        state: LifecycleState,
        reason: impl Into<String>,
    ) -> Self {
        PactError::StateConflict {
            action: action.to_string(),
            state,
            reason: reason.into(),
        }
    }

    /// Structured detail for API bodies.
    pub fn details(&self) -> serde_json::Value {
        match self {
            PactError::Validation(violations) => serde_json::json!({ "violations": violations }),
            PactError::StateConflict { action, state, .. } => {
                serde_json::json!({ "action": action, "state": state })
            }
            PactError::DuplicateRequest { request_id, .. } => {
                serde_json::json!({ "pending_request_id": request_id })
            }
            PactError::IncompleteConfiguration { missing } => {
                serde_json::json!({ "missing_deliverables": missing })
            }
            PactError::NotFound(NotFound::UnsupportedContractType(ct)) => {
                serde_json::json!({ "contract_type": ct, "unsupported": true })
            }
            _ => serde_json::Value::Null,
        }
    }
}
