use async_trait::async_trait;
use pact_core::{
    Catalog, ContractType, Indicator, Partner, ReconfigurationRequest, RequestStatus, Selection,
};

use crate::error::StorageError;
use crate::record::{IndicatorRecord, PartnerRecord};

/// The storage trait for performance agreement backends.
///
/// A `PactStorage` implementation provides durable, transactional storage
/// for partner lifecycle records, selections, reconfiguration requests,
/// indicators and the deliverable catalog.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` -- start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` -- commit and consume the transaction
///    OR `abort_snapshot(snapshot)` -- roll back and consume the transaction
///
/// Reads through a snapshot observe that snapshot's own writes. If a
/// `Snapshot` is dropped without committing, nothing it wrote is applied.
///
/// ## OCC Conflict Detection
///
/// `update_partner` and `update_indicator` are conditional on
/// `version = expected_version`, checked both when the write is staged and
/// again at commit. A mismatch returns `StorageError::ConcurrentConflict`.
/// Reconfiguration request updates are conditional on the status read in
/// the same snapshot being unchanged at commit.
///
/// ## Constraints
///
/// Enforced at commit regardless of what callers checked beforehand:
/// - one selection per `(partner, deliverable)`
/// - at most one `Pending` reconfiguration request per partner
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait PactStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable atomically.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Partners (within snapshot) ────────────────────────────────────────────

    /// Create a partner record at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyInitialized)` if the partner exists.
    async fn initialize_partner(
        &self,
        snapshot: &mut Self::Snapshot,
        partner: &Partner,
    ) -> Result<(), StorageError>;

    /// Read a partner's current record for a conditional update.
    async fn get_partner_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        partner_id: &str,
    ) -> Result<PartnerRecord, StorageError>;

    /// Version-validated write of a partner record (OCC).
    ///
    /// Returns the new version number on success.
    async fn update_partner(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        partner: &Partner,
    ) -> Result<i64, StorageError>;

    // ── Selections (within snapshot) ──────────────────────────────────────────

    /// Current selections of a partner, including this snapshot's writes.
    async fn get_selections_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        partner_id: &str,
    ) -> Result<Vec<Selection>, StorageError>;

    /// Replace every selection of a partner.
    ///
    /// Returns `Err(StorageError::UniqueViolation)` if `selections` names a
    /// deliverable twice or belongs to another partner.
    async fn replace_selections(
        &self,
        snapshot: &mut Self::Snapshot,
        partner_id: &str,
        selections: Vec<Selection>,
    ) -> Result<(), StorageError>;

    // ── Reconfiguration requests (within snapshot) ────────────────────────────

    async fn insert_reconfiguration_request(
        &self,
        snapshot: &mut Self::Snapshot,
        request: ReconfigurationRequest,
    ) -> Result<(), StorageError>;

    async fn get_reconfiguration_request_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, StorageError>;

    async fn update_reconfiguration_request(
        &self,
        snapshot: &mut Self::Snapshot,
        request: ReconfigurationRequest,
    ) -> Result<(), StorageError>;

    // ── Indicators and catalog (within snapshot) ──────────────────────────────

    /// Create an indicator at version 0.
    async fn initialize_indicator(
        &self,
        snapshot: &mut Self::Snapshot,
        indicator: &Indicator,
    ) -> Result<(), StorageError>;

    async fn get_indicator_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        indicator_id: &str,
    ) -> Result<IndicatorRecord, StorageError>;

    /// Version-validated write of an indicator (OCC).
    async fn update_indicator(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_version: i64,
        indicator: &Indicator,
    ) -> Result<i64, StorageError>;

    /// Replace the catalog of `catalog.contract_type`.
    async fn replace_catalog(
        &self,
        snapshot: &mut Self::Snapshot,
        catalog: Catalog,
    ) -> Result<(), StorageError>;

    // ── Query operations (outside snapshot) ───────────────────────────────────

    async fn get_partner(&self, partner_id: &str) -> Result<PartnerRecord, StorageError>;

    async fn list_selections(&self, partner_id: &str) -> Result<Vec<Selection>, StorageError>;

    async fn get_reconfiguration_request(
        &self,
        request_id: &str,
    ) -> Result<ReconfigurationRequest, StorageError>;

    /// List requests in creation order, optionally filtered by partner and status.
    async fn list_reconfiguration_requests(
        &self,
        partner_id: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<ReconfigurationRequest>, StorageError>;

    async fn get_indicator(&self, indicator_id: &str) -> Result<IndicatorRecord, StorageError>;

    async fn list_indicators(
        &self,
        contract_type: Option<ContractType>,
    ) -> Result<Vec<IndicatorRecord>, StorageError>;

    /// The stored catalog for a contract type, if any was ever written.
    async fn get_catalog(
        &self,
        contract_type: ContractType,
    ) -> Result<Option<Catalog>, StorageError>;
}
