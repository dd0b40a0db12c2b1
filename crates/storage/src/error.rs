/// All errors that can be returned by a PactStorage implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction modified
    /// the record concurrently. The expected version was not found.
    #[error("concurrent conflict on {kind} '{id}': expected version {expected_version}")]
    ConcurrentConflict {
        kind: &'static str,
        id: String,
        expected_version: i64,
    },

    /// No partner with the given id.
    #[error("partner not found: {partner_id}")]
    PartnerNotFound { partner_id: String },

    /// No reconfiguration request with the given id.
    #[error("reconfiguration request not found: {request_id}")]
    RequestNotFound { request_id: String },

    /// No indicator with the given id.
    #[error("indicator not found: {indicator_id}")]
    IndicatorNotFound { indicator_id: String },

    /// A record with this key already exists.
    #[error("{kind} already initialized: {id}")]
    AlreadyInitialized { kind: &'static str, id: String },

    /// A uniqueness constraint would be violated by the write.
    #[error("unique constraint '{constraint}' violated for {key}")]
    UniqueViolation {
        constraint: &'static str,
        key: String,
    },

    /// A backend-specific storage error (connection, serialization, lock poisoning, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Constraint: at most one `(partner, deliverable)` selection.
pub const SELECTION_UNIQUE: &str = "selection_partner_deliverable";

/// Constraint: at most one pending reconfiguration request per partner.
pub const PENDING_REQUEST_UNIQUE: &str = "reconfiguration_one_pending_per_partner";
