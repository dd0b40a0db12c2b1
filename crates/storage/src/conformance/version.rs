use std::future::Future;

use pact_core::LifecycleState;

use super::{make_indicator, make_partner, seed_indicator, seed_partner, TestResult};
use crate::{PactStorage, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "version",
            "update_increments_version",
            update_increments_version(factory).await,
        ),
        TestResult::from_result(
            "version",
            "multiple_updates_in_one_snapshot",
            multiple_updates_in_one_snapshot(factory).await,
        ),
        TestResult::from_result(
            "version",
            "wrong_version_returns_conflict",
            wrong_version_returns_conflict(factory).await,
        ),
        TestResult::from_result(
            "version",
            "stale_version_after_intervening_commit",
            stale_version_after_intervening_commit(factory).await,
        ),
        TestResult::from_result(
            "version",
            "indicator_versions_checked",
            indicator_versions_checked(factory).await,
        ),
    ]
}

async fn update_once<S: PactStorage>(
    storage: &S,
    expected_version: i64,
    state: LifecycleState,
) -> Result<i64, StorageError> {
    let mut snap = storage.begin_snapshot().await?;
    let mut partner = make_partner("p-1");
    partner.state = state;
    match storage.update_partner(&mut snap, expected_version, &partner).await {
        Ok(v) => {
            storage.commit_snapshot(snap).await?;
            Ok(v)
        }
        Err(e) => {
            let _ = storage.abort_snapshot(snap).await;
            Err(e)
        }
    }
}

async fn update_increments_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    for (expected, state) in [
        (0, LifecycleState::Read),
        (1, LifecycleState::Signed),
        (2, LifecycleState::Configuring),
    ] {
        let v = update_once(&storage, expected, state)
            .await
            .map_err(|e| format!("update from v{expected}: {e}"))?;
        if v != expected + 1 {
            return Err(format!("expected v{}, got v{v}", expected + 1));
        }
    }

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.version != 3 || rec.partner.state != LifecycleState::Configuring {
        return Err(format!("final record v{} {}", rec.version, rec.partner.state));
    }
    Ok(())
}

async fn multiple_updates_in_one_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
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
    partner.state = LifecycleState::Read;
    storage
        .update_partner(&mut snap, 0, &partner)
        .await
        .map_err(|e| format!("first: {e}"))?;
    partner.state = LifecycleState::Signed;
    let v = storage
        .update_partner(&mut snap, 1, &partner)
        .await
        .map_err(|e| format!("second: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if v != 2 || rec.version != 2 || rec.partner.state != LifecycleState::Signed {
        return Err(format!("expected v2 signed, got v{} {}", rec.version, rec.partner.state));
    }
    Ok(())
}

async fn wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    for wrong in [-1, 1, 7] {
        match update_once(&storage, wrong, LifecycleState::Read).await {
            Err(StorageError::ConcurrentConflict {
                kind,
                id,
                expected_version,
            }) if kind == "partner" && id == "p-1" && expected_version == wrong => {}
            other => {
                return Err(format!(
                    "expected ConcurrentConflict for v{wrong}, got {other:?}"
                ))
            }
        }
    }
    Ok(())
}

async fn stale_version_after_intervening_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    // Both snapshots read version 0.
    let mut first = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin first: {e}"))?;
    let mut second = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin second: {e}"))?;
    let seen_first = storage
        .get_partner_for_update(&mut first, "p-1")
        .await
        .map_err(|e| format!("read first: {e}"))?;
    let seen_second = storage
        .get_partner_for_update(&mut second, "p-1")
        .await
        .map_err(|e| format!("read second: {e}"))?;

    let mut partner = make_partner("p-1");
    partner.state = LifecycleState::Read;
    storage
        .update_partner(&mut first, seen_first.version, &partner)
        .await
        .map_err(|e| format!("update first: {e}"))?;
    storage
        .commit_snapshot(first)
        .await
        .map_err(|e| format!("commit first: {e}"))?;

    // The conflict may surface at update or at commit depending on the backend.
    let outcome = match storage
        .update_partner(&mut second, seen_second.version, &partner)
        .await
    {
        Ok(_) => storage.commit_snapshot(second).await,
        Err(e) => {
            let _ = storage.abort_snapshot(second).await;
            Err(e)
        }
    };
    match outcome {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

async fn indicator_versions_checked<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_indicator(&storage, "ind-1").await?;

    let mut edited = make_indicator("ind-1");
    edited.baseline = rust_decimal::Decimal::new(940, 1);

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let v = storage
        .update_indicator(&mut snap, 0, &edited)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    if v != 1 {
        return Err(format!("expected v1, got v{v}"));
    }

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin stale: {e}"))?;
    let stale = storage.update_indicator(&mut snap, 0, &edited).await;
    let _ = storage.abort_snapshot(snap).await;
    match stale {
        Err(StorageError::ConcurrentConflict { kind, .. }) if kind == "indicator" => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}
