use std::future::Future;

use pact_core::LifecycleState;

use super::{make_indicator, make_partner, seed_indicator, seed_partner, TestResult};
use crate::{PactStorage, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "initialize_partner_at_version_0",
            initialize_partner_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "double_initialize_in_same_snapshot",
            double_initialize_in_same_snapshot(factory).await,
        ),
        TestResult::from_result(
            "init",
            "double_initialize_across_snapshots",
            double_initialize_across_snapshots(factory).await,
        ),
        TestResult::from_result(
            "init",
            "initialize_indicator_at_version_0",
            initialize_indicator_at_version_0(factory).await,
        ),
        TestResult::from_result(
            "init",
            "double_initialize_indicator",
            double_initialize_indicator(factory).await,
        ),
        TestResult::from_result(
            "init",
            "new_partner_has_no_selections",
            new_partner_has_no_selections(factory).await,
        ),
    ]
}

async fn initialize_partner_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    if rec.partner.state != LifecycleState::Unread {
        return Err(format!("expected unread, got {}", rec.partner.state));
    }
    if rec.partner.final_signature.is_some() {
        return Err("new partner must not carry a signature".into());
    }
    Ok(())
}

async fn double_initialize_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .initialize_partner(&mut snap, &make_partner("p-1"))
        .await
        .map_err(|e| format!("first init: {e}"))?;
    let second = storage
        .initialize_partner(&mut snap, &make_partner("p-1"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match second {
        Err(StorageError::AlreadyInitialized { kind, id }) if kind == "partner" && id == "p-1" => {
            Ok(())
        }
        other => Err(format!("expected AlreadyInitialized, got {other:?}")),
    }
}

async fn double_initialize_across_snapshots<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .initialize_partner(&mut snap, &make_partner("p-1"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyInitialized { .. }) => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {other:?}")),
    }
}

async fn initialize_indicator_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_indicator(&storage, "ind-1").await?;

    let rec = storage
        .get_indicator("ind-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    if rec.indicator != make_indicator("ind-1") {
        return Err("stored indicator differs from the one written".into());
    }
    Ok(())
}

async fn double_initialize_indicator<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_indicator(&storage, "ind-1").await?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .initialize_indicator(&mut snap, &make_indicator("ind-1"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyInitialized { kind, .. }) if kind == "indicator" => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {other:?}")),
    }
}

async fn new_partner_has_no_selections<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed_partner(&storage, "p-1").await?;
    let rows = storage
        .list_selections("p-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !rows.is_empty() {
        return Err(format!("expected no selections, got {}", rows.len()));
    }
    Ok(())
}
