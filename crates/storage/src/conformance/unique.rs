use std::future::Future;

use pact_core::RequestStatus;

use super::{make_request, make_selection, seed_partner, seed_request, TestResult};
use crate::error::{PENDING_REQUEST_UNIQUE, SELECTION_UNIQUE};
use crate::{PactStorage, StorageError};

pub(super) async fn run_unique_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "unique",
            "duplicate_deliverable_rejected",
            duplicate_deliverable_rejected(factory).await,
        ),
        TestResult::from_result(
            "unique",
            "foreign_selection_rejected",
            foreign_selection_rejected(factory).await,
        ),
        TestResult::from_result(
            "unique",
            "second_pending_request_rejected",
            second_pending_request_rejected(factory).await,
        ),
        TestResult::from_result(
            "unique",
            "new_request_allowed_after_resolution",
            new_request_allowed_after_resolution(factory).await,
        ),
        TestResult::from_result(
            "unique",
            "double_resolution_conflicts",
            double_resolution_conflicts(factory).await,
        ),
    ]
}

async fn duplicate_deliverable_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .replace_selections(
            &mut snap,
            "p-1",
            vec![
                make_selection("p-1", "d1", "o1"),
                make_selection("p-1", "d1", "o2"),
            ],
        )
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::UniqueViolation { constraint, .. }) if constraint == SELECTION_UNIQUE => {
            Ok(())
        }
        other => Err(format!("expected UniqueViolation, got {other:?}")),
    }
}

async fn foreign_selection_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .replace_selections(&mut snap, "p-1", vec![make_selection("p-2", "d1", "o1")])
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::UniqueViolation { .. }) => Ok(()),
        other => Err(format!("expected UniqueViolation, got {other:?}")),
    }
}

/// Two snapshots each insert a pending request for the same partner. Both
/// stage fine; only the first commit may succeed.
async fn second_pending_request_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    let mut a = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin a: {e}"))?;
    let mut b = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin b: {e}"))?;
    storage
        .insert_reconfiguration_request(&mut a, make_request("req-a", "p-1"))
        .await
        .map_err(|e| format!("insert a: {e}"))?;
    let staged_b = storage
        .insert_reconfiguration_request(&mut b, make_request("req-b", "p-1"))
        .await;
    storage
        .commit_snapshot(a)
        .await
        .map_err(|e| format!("commit a: {e}"))?;

    let outcome = match staged_b {
        Ok(()) => storage.commit_snapshot(b).await,
        Err(e) => {
            let _ = storage.abort_snapshot(b).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::UniqueViolation { constraint, key })
            if constraint == PENDING_REQUEST_UNIQUE && key == "p-1" =>
        {
            Ok(())
        }
        other => Err(format!("expected UniqueViolation, got {other:?}")),
    }
}

async fn new_request_allowed_after_resolution<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;
    seed_request(&storage, "req-1", "p-1").await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let mut req = storage
        .get_reconfiguration_request_for_update(&mut snap, "req-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    req.status = RequestStatus::Rejected;
    storage
        .update_reconfiguration_request(&mut snap, req)
        .await
        .map_err(|e| format!("reject: {e}"))?;
    storage
        .insert_reconfiguration_request(&mut snap, make_request("req-2", "p-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let pending = storage
        .list_reconfiguration_requests(Some("p-1"), Some(RequestStatus::Pending))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if pending.len() != 1 || pending[0].id != "req-2" {
        return Err(format!("expected req-2 pending, got {pending:?}"));
    }
    Ok(())
}

/// Two admins resolve the same pending request concurrently. The second
/// commit must fail because the status it read is no longer current.
async fn double_resolution_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;
    seed_request(&storage, "req-1", "p-1").await?;

    let mut approve = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin approve: {e}"))?;
    let mut reject = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin reject: {e}"))?;

    let mut a = storage
        .get_reconfiguration_request_for_update(&mut approve, "req-1")
        .await
        .map_err(|e| format!("read approve: {e}"))?;
    let mut r = storage
        .get_reconfiguration_request_for_update(&mut reject, "req-1")
        .await
        .map_err(|e| format!("read reject: {e}"))?;
    a.status = RequestStatus::Approved;
    r.status = RequestStatus::Rejected;

    storage
        .update_reconfiguration_request(&mut approve, a)
        .await
        .map_err(|e| format!("stage approve: {e}"))?;
    storage
        .commit_snapshot(approve)
        .await
        .map_err(|e| format!("commit approve: {e}"))?;

    let outcome = match storage.update_reconfiguration_request(&mut reject, r).await {
        Ok(()) => storage.commit_snapshot(reject).await,
        Err(e) => {
            let _ = storage.abort_snapshot(reject).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }

    let stored = storage
        .get_reconfiguration_request("req-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.status != RequestStatus::Approved {
        return Err(format!("expected approved, got {:?}", stored.status));
    }
    Ok(())
}
