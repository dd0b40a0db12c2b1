//! Partners, their contract type and their position in the agreement lifecycle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::error::{NotFound, PactError, Violation};

// ──────────────────────────────────────────────
// Contract types
// ──────────────────────────────────────────────

/// Agreement template assigned to a partner by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractType {
    Full,
    Partial,
    Limited,
    Observer,
}

impl ContractType {
    pub const ALL: [ContractType; 4] = [
        ContractType::Full,
        ContractType::Partial,
        ContractType::Limited,
        ContractType::Observer,
    ];

    /// Only these contract types carry configurable deliverables.
    pub fn is_configurable(self) -> bool {
        matches!(self, ContractType::Full | ContractType::Partial)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContractType::Full => "full",
            ContractType::Partial => "partial",
            ContractType::Limited => "limited",
            ContractType::Observer => "observer",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractType {
    type Err = PactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractType::ALL
            .into_iter()
            .find(|ct| ct.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| NotFound::UnknownContractType(s.to_string()).into())
    }
}

// ──────────────────────────────────────────────
// Lifecycle
// ──────────────────────────────────────────────

/// Agreement lifecycle states in strict forward order.
///
/// `PendingReconfiguration` is a sub-state of `Submitted`; it orders after it
/// so that "at least submitted" comparisons hold for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unread,
    Read,
    Signed,
    Configuring,
    Configured,
    Submitted,
    PendingReconfiguration,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Unread => "unread",
            LifecycleState::Read => "read",
            LifecycleState::Signed => "signed",
            LifecycleState::Configuring => "configuring",
            LifecycleState::Configured => "configured",
            LifecycleState::Submitted => "submitted",
            LifecycleState::PendingReconfiguration => "pending_reconfiguration",
        }
    }

    /// Selections may be written in these states.
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            LifecycleState::Signed | LifecycleState::Configuring | LifecycleState::Configured
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Partner,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Partner => "partner",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "partner" => Ok(Role::Partner),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Authenticated caller as asserted by the identity provider. Trusted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub subject: String,
    pub role: Role,
}

impl Principal {
    pub fn partner(subject: impl Into<String>) -> Self {
        Principal {
            subject: subject.into(),
            role: Role::Partner,
        }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Principal {
            subject: subject.into(),
            role: Role::Admin,
        }
    }

    pub fn require_admin(&self, action: &str) -> Result<(), PactError> {
        match self.role {
            Role::Admin => Ok(()),
            role => Err(PactError::Permission {
                role: role.as_str().to_string(),
                action: action.to_string(),
            }),
        }
    }
}

// ──────────────────────────────────────────────
// Partner record
// ──────────────────────────────────────────────

/// Data captured with the final signature on a submitted configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSignature {
    pub signatory_name: String,
    pub signatory_title: String,
    /// Typed signature or an opaque reference to a captured signature image.
    pub signature: String,
    #[serde(with = "crate::iso_date")]
    pub signed_on: Date,
}

impl FinalSignature {
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.signatory_name.trim().is_empty() {
            violations.push(Violation::field("signatory_name", "must not be empty"));
        }
        if self.signatory_title.trim().is_empty() {
            violations.push(Violation::field("signatory_title", "must not be empty"));
        }
        if self.signature.trim().is_empty() {
            violations.push(Violation::field("signature", "must not be empty"));
        }
        violations
    }
}

/// The lifecycle-relevant slice of a partner owned by this engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: String,
    pub contract_type: ContractType,
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_signature: Option<FinalSignature>,
}

impl Partner {
    pub fn new(id: impl Into<String>, contract_type: ContractType) -> Self {
        Partner {
            id: id.into(),
            contract_type,
            state: LifecycleState::Unread,
            final_signature: None,
        }
    }

    pub fn has_read(&self) -> bool {
        self.state >= LifecycleState::Read
    }

    pub fn has_signed(&self) -> bool {
        self.state >= LifecycleState::Signed
    }

    pub fn configuration_complete(&self) -> bool {
        self.state >= LifecycleState::Configured
    }
}

/// Read model returned by the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnerStatus {
    pub partner_id: String,
    pub contract_type: ContractType,
    pub state: LifecycleState,
    pub has_read: bool,
    pub has_signed: bool,
    pub configuration_complete: bool,
    pub submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_request_id: Option<String>,
}

impl PartnerStatus {
    pub fn of(partner: &Partner, pending_request_id: Option<String>) -> Self {
        PartnerStatus {
            partner_id: partner.id.clone(),
            contract_type: partner.contract_type,
            state: partner.state,
            has_read: partner.has_read(),
            has_signed: partner.has_signed(),
            configuration_complete: partner.configuration_complete(),
            submitted: partner.final_signature.is_some(),
            pending_request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_type_parse() {
        assert_eq!("Full".parse::<ContractType>().unwrap(), ContractType::Full);
        assert_eq!(" partial ".parse::<ContractType>().unwrap(), ContractType::Partial);
        let err = "gold".parse::<ContractType>().unwrap_err();
        assert_eq!(
            err,
            PactError::NotFound(NotFound::UnknownContractType("gold".into()))
        );
    }

    #[test]
    fn only_two_contract_types_configurable() {
        let configurable: Vec<_> = ContractType::ALL
            .into_iter()
            .filter(|ct| ct.is_configurable())
            .collect();
        assert_eq!(configurable, vec![ContractType::Full, ContractType::Partial]);
    }

    #[test]
    fn flags_follow_state() {
        let mut p = Partner::new("p1", ContractType::Full);
        assert!(!p.has_read());
        p.state = LifecycleState::Signed;
        assert!(p.has_read() && p.has_signed() && !p.configuration_complete());
        p.state = LifecycleState::PendingReconfiguration;
        assert!(p.configuration_complete());
    }

    #[test]
    fn partner_cannot_act_as_admin() {
        let err = Principal::partner("p1")
            .require_admin("approve reconfiguration")
            .unwrap_err();
        assert!(matches!(err, PactError::Permission { .. }));
        assert!(Principal::admin("a").require_admin("x").is_ok());
    }

    #[test]
    fn signature_serde_uses_iso_dates() {
        let sig = FinalSignature {
            signatory_name: "A. Person".into(),
            signatory_title: "Director".into(),
            signature: "A. Person".into(),
            signed_on: time::macros::date!(2024 - 03 - 01),
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["signed_on"], "2024-03-01");
        let back: FinalSignature = serde_json::from_value(json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn signature_validation_reports_all_empty_fields() {
        let sig = FinalSignature {
            signatory_name: " ".into(),
            signatory_title: String::new(),
            signature: "x".into(),
            signed_on: time::macros::date!(2024 - 03 - 01),
        };
        assert_eq!(sig.validate().len(), 2);
    }
}
