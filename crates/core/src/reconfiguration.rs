//! Partner-initiated, admin-gated requests to reopen a submitted configuration.

use serde::{Deserialize, Serialize};

use crate::partner::ContractType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconfigurationRequest {
    pub id: String,
    pub partner_id: String,
    /// Copied from the partner at creation so admin listings can be scoped.
    pub contract_type: ContractType,
    pub reason: String,
    pub status: RequestStatus,
    /// RFC 3339 timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp; set once the request is approved or rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
}

/// Which pending requests an administrator is looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminScope {
    /// Empty means every contract type.
    #[serde(default)]
    pub contract_types: Vec<ContractType>,
}

impl AdminScope {
    pub fn all() -> Self {
        AdminScope::default()
    }

    pub fn only(contract_type: ContractType) -> Self {
        AdminScope {
            contract_types: vec![contract_type],
        }
    }

    pub fn covers(&self, contract_type: ContractType) -> bool {
        self.contract_types.is_empty() || self.contract_types.contains(&contract_type)
    }
}
