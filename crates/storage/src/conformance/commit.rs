use std::future::Future;

use pact_core::{LifecycleState, RequestStatus};

use super::{make_partner, make_request, make_selection, seed_partner, seed_request, TestResult};
use crate::{PactStorage, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_record_commit_is_visible",
            multi_record_commit_is_visible(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_applies_nothing",
            failed_commit_applies_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "replace_selections_replaces_all",
            replace_selections_replaces_all(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "request_resolution_persists",
            request_resolution_persists(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "requests_listed_in_creation_order",
            requests_listed_in_creation_order(factory).await,
        ),
    ]
}

async fn multi_record_commit_is_visible<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let mut partner = make_partner("p-1");
    partner.state = LifecycleState::PendingReconfiguration;
    storage
        .update_partner(&mut snap, 0, &partner)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .replace_selections(&mut snap, "p-1", vec![make_selection("p-1", "d1", "o1")])
        .await
        .map_err(|e| format!("replace: {e}"))?;
    storage
        .insert_reconfiguration_request(&mut snap, make_request("req-1", "p-1"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get partner: {e}"))?;
    let rows = storage
        .list_selections("p-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    let req = storage
        .get_reconfiguration_request("req-1")
        .await
        .map_err(|e| format!("get request: {e}"))?;

    if rec.partner.state != LifecycleState::PendingReconfiguration || rec.version != 1 {
        return Err(format!("partner not committed: v{} {}", rec.version, rec.partner.state));
    }
    if rows.len() != 1 {
        return Err(format!("expected 1 selection, got {}", rows.len()));
    }
    if req.status != RequestStatus::Pending {
        return Err(format!("expected pending request, got {:?}", req.status));
    }
    Ok(())
}

/// A snapshot touching two partners fails at commit because one was changed
/// underneath it. Neither write may be applied.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;
    seed_partner(&storage, "p-2").await?;

    let mut read = make_partner("p-1");
    read.state = LifecycleState::Read;

    let mut slow = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin slow: {e}"))?;
    storage
        .update_partner(&mut slow, 0, &read)
        .await
        .map_err(|e| format!("slow update p-1: {e}"))?;
    let mut read_2 = make_partner("p-2");
    read_2.state = LifecycleState::Read;
    storage
        .update_partner(&mut slow, 0, &read_2)
        .await
        .map_err(|e| format!("slow update p-2: {e}"))?;

    let mut fast = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin fast: {e}"))?;
    storage
        .update_partner(&mut fast, 0, &read_2)
        .await
        .map_err(|e| format!("fast update: {e}"))?;
    storage
        .commit_snapshot(fast)
        .await
        .map_err(|e| format!("fast commit: {e}"))?;

    match storage.commit_snapshot(slow).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        other => return Err(format!("expected ConcurrentConflict, got {other:?}")),
    }

    let p1 = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get p-1: {e}"))?;
    if p1.version != 0 {
        return Err(format!("p-1 partially committed at v{}", p1.version));
    }
    Ok(())
}

async fn replace_selections_replaces_all<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    for rows in [
        vec![
            make_selection("p-1", "d1", "o1"),
            make_selection("p-1", "d2", "o1"),
        ],
        vec![make_selection("p-1", "d3", "o2")],
    ] {
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin: {e}"))?;
        storage
            .replace_selections(&mut snap, "p-1", rows)
            .await
            .map_err(|e| format!("replace: {e}"))?;
        storage
            .commit_snapshot(snap)
            .await
            .map_err(|e| format!("commit: {e}"))?;
    }

    let rows = storage
        .list_selections("p-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<&str> = rows.iter().map(|s| s.deliverable_id.as_str()).collect();
    if ids != ["d3"] {
        return Err(format!("expected only d3 after replace, got {ids:?}"));
    }
    Ok(())
}

async fn request_resolution_persists<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("get for update: {e}"))?;
    req.status = RequestStatus::Approved;
    req.resolved_by = Some("admin-1".into());
    req.resolved_at = Some("2025-04-03T00:00:00Z".into());
    storage
        .update_reconfiguration_request(&mut snap, req)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let stored = storage
        .get_reconfiguration_request("req-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if stored.status != RequestStatus::Approved || stored.resolved_by.as_deref() != Some("admin-1")
    {
        return Err(format!("resolution not persisted: {stored:?}"));
    }
    let pending = storage
        .list_reconfiguration_requests(None, Some(RequestStatus::Pending))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !pending.is_empty() {
        return Err("approved request still listed as pending".into());
    }
    Ok(())
}

async fn requests_listed_in_creation_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    for id in ["p-b", "p-a", "p-c"] {
        seed_partner(&storage, id).await?;
    }
    seed_request(&storage, "req-b", "p-b").await?;
    seed_request(&storage, "req-a", "p-a").await?;
    seed_request(&storage, "req-c", "p-c").await?;

    let all = storage
        .list_reconfiguration_requests(None, None)
        .await
        .map_err(|e| format!("list all: {e}"))?;
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    if ids != ["req-b", "req-a", "req-c"] {
        return Err(format!("expected creation order, got {ids:?}"));
    }

    let only_a = storage
        .list_reconfiguration_requests(Some("p-a"), None)
        .await
        .map_err(|e| format!("list p-a: {e}"))?;
    if only_a.len() != 1 || only_a[0].id != "req-a" {
        return Err(format!("partner filter wrong: {only_a:?}"));
    }
    Ok(())
}
