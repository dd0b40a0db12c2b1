//! Snapshot plumbing shared by every operation: bounded storage calls,
//! commit-or-abort, and the retry loop for optimistic conflicts.

use std::future::Future;
use std::sync::atomic::Ordering;

use pact_core::{NotFound, PactError, Violation};
use pact_storage::{PactStorage, StorageError, PENDING_REQUEST_UNIQUE};
use tracing::{debug, warn};

use crate::Executor;

/// Why one transaction attempt did not commit.
#[derive(Debug)]
pub(crate) enum TxError {
    /// Another writer committed first. The attempt may be re-run.
    Conflict(StorageError),
    Fail(PactError),
}

impl From<PactError> for TxError {
    fn from(err: PactError) -> Self {
        TxError::Fail(err)
    }
}

impl From<StorageError> for TxError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConcurrentConflict { .. } => TxError::Conflict(err),
            // The re-run observes the winning request and reports it.
            StorageError::UniqueViolation { constraint, key }
                if constraint == PENDING_REQUEST_UNIQUE =>
            {
                TxError::Conflict(StorageError::UniqueViolation { constraint, key })
            }
            StorageError::PartnerNotFound { partner_id } => {
                TxError::Fail(NotFound::Partner(partner_id).into())
            }
            StorageError::RequestNotFound { request_id } => {
                TxError::Fail(NotFound::ReconfigurationRequest(request_id).into())
            }
            StorageError::IndicatorNotFound { indicator_id } => {
                TxError::Fail(NotFound::Indicator(indicator_id).into())
            }
            StorageError::AlreadyInitialized { kind, id } => {
                TxError::Fail(PactError::Validation(vec![Violation::field(
                    "id",
                    format!("{kind} '{id}' already exists"),
                )]))
            }
            other => TxError::Fail(PactError::Persistence(other.to_string())),
        }
    }
}

impl<S: PactStorage> Executor<S> {
    /// Run one storage call under the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, TxError> {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => result.map_err(TxError::from),
            Err(_) => {
                warn!(
                    timeout_ms = self.settings.storage_timeout.as_millis() as u64,
                    "Storage call timed out"
                );
                Err(TxError::Fail(PactError::Persistence(format!(
                    "storage call timed out after {} ms",
                    self.settings.storage_timeout.as_millis()
                ))))
            }
        }
    }

    /// A bounded query outside any snapshot.
    pub(crate) async fn query<T>(
        &self,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, PactError> {
        match self.bounded(call).await {
            Ok(value) => Ok(value),
            Err(TxError::Fail(err)) => Err(err),
            Err(TxError::Conflict(err)) => Err(PactError::Persistence(err.to_string())),
        }
    }

    pub(crate) async fn begin(&self) -> Result<S::Snapshot, TxError> {
        self.bounded(self.storage.begin_snapshot()).await
    }

    /// Commit the snapshot if `result` is Ok, abort it otherwise.
    pub(crate) async fn finish<T>(
        &self,
        snapshot: S::Snapshot,
        result: Result<T, TxError>,
    ) -> Result<T, TxError> {
        match result {
            Ok(value) => {
                self.bounded(self.storage.commit_snapshot(snapshot)).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort) = self.bounded(self.storage.abort_snapshot(snapshot)).await {
                    warn!(error = ?abort, "Snapshot abort failed");
                }
                Err(err)
            }
        }
    }

    /// Re-run `attempt` while it loses optimistic races, up to the configured bound.
    pub(crate) async fn retrying<T, F, Fut>(&self, action: &str, mut attempt: F) -> Result<T, PactError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TxError>>,
    {
        let attempts = self.settings.max_conflict_retries + 1;
        for n in 1..=attempts {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(TxError::Fail(err)) => return Err(err),
                Err(TxError::Conflict(err)) => {
                    if n < attempts {
                        self.conflict_retries.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!(action, attempt = n, error = %err, "Conflicting commit, retrying");
                }
            }
        }
        warn!(action, attempts, "Giving up after repeated conflicts");
        Err(PactError::Persistence(format!(
            "{action}: gave up after {attempts} conflicting attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::ExecutorSettings;
    use pact_storage::MemoryStorage;

    fn conflict() -> TxError {
        TxError::Conflict(StorageError::ConcurrentConflict {
            kind: "partner",
            id: "p-1".into(),
            expected_version: 0,
        })
    }

    #[tokio::test]
    async fn failed_abort_keeps_the_original_error() {
        let storage = Arc::new(MemoryStorage::with_latency(Duration::from_millis(50)));
        let snapshot = storage.begin_snapshot().await.unwrap();
        let ex = Executor::new(
            storage,
            ExecutorSettings {
                storage_timeout: Duration::from_millis(5),
                ..ExecutorSettings::default()
            },
        );

        let result: Result<(), TxError> = ex
            .finish(snapshot, Err(TxError::Fail(NotFound::Partner("p-1".into()).into())))
            .await;
        match result {
            Err(TxError::Fail(err)) => assert_eq!(err.kind(), "not_found"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn retries_are_counted_until_success() {
        let ex = Executor::new(Arc::new(MemoryStorage::new()), ExecutorSettings::default());
        let mut calls = 0;
        let value = ex
            .retrying("test", || {
                calls += 1;
                let n = calls;
                async move { if n < 3 { Err(conflict()) } else { Ok(n) } }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(ex.conflict_retries(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_as_persistence() {
        let ex = Executor::new(
            Arc::new(MemoryStorage::new()),
            ExecutorSettings {
                max_conflict_retries: 2,
                ..ExecutorSettings::default()
            },
        );
        let err = ex
            .retrying("test", || async { Err::<(), _>(conflict()) })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "persistence");
        assert_eq!(ex.conflict_retries(), 2);
    }
}
