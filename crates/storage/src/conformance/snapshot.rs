use std::future::Future;

use pact_core::{Catalog, ContractType, LifecycleState};

use super::{make_partner, make_selection, seed_partner, TestResult};
use crate::{PactStorage, StorageError};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_partner_invisible",
            uncommitted_partner_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "snapshot_reads_own_writes",
            snapshot_reads_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "aborted_snapshot_discards_writes",
            aborted_snapshot_discards_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "dropped_snapshot_discards_writes",
            dropped_snapshot_discards_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "catalog_visible_only_after_commit",
            catalog_visible_only_after_commit(factory).await,
        ),
    ]
}

async fn uncommitted_partner_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("init: {e}"))?;

    let visible = storage.get_partner("p-1").await;
    let _ = storage.abort_snapshot(snap).await;
    match visible {
        Err(StorageError::PartnerNotFound { .. }) => Ok(()),
        other => Err(format!("uncommitted partner leaked: {other:?}")),
    }
}

async fn snapshot_reads_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("update: {e}"))?;
    storage
        .replace_selections(&mut snap, "p-1", vec![make_selection("p-1", "d1", "o1")])
        .await
        .map_err(|e| format!("replace: {e}"))?;

    let rec = storage
        .get_partner_for_update(&mut snap, "p-1")
        .await
        .map_err(|e| format!("read back: {e}"))?;
    let rows = storage
        .get_selections_for_update(&mut snap, "p-1")
        .await
        .map_err(|e| format!("read selections: {e}"))?;
    let outside = storage
        .list_selections("p-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    let _ = storage.abort_snapshot(snap).await;

    if rec.version != 1 || rec.partner.state != LifecycleState::Read {
        return Err(format!(
            "snapshot should see its own update, got v{} {}",
            rec.version, rec.partner.state
        ));
    }
    if rows.len() != 1 {
        return Err(format!("snapshot should see 1 staged selection, got {}", rows.len()));
    }
    if !outside.is_empty() {
        return Err("staged selections visible outside the snapshot".into());
    }
    Ok(())
}

async fn aborted_snapshot_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("update: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.version != 0 || rec.partner.state != LifecycleState::Unread {
        return Err(format!(
            "abort leaked write: v{} {}",
            rec.version, rec.partner.state
        ));
    }
    Ok(())
}

async fn dropped_snapshot_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    {
        let mut snap = storage
            .begin_snapshot()
            .await
            .map_err(|e| format!("begin: {e}"))?;
        storage
            .initialize_partner(&mut snap, &make_partner("p-1"))
            .await
            .map_err(|e| format!("init: {e}"))?;
    }
    match storage.get_partner("p-1").await {
        Err(StorageError::PartnerNotFound { .. }) => Ok(()),
        other => Err(format!("dropped snapshot leaked write: {other:?}")),
    }
}

async fn catalog_visible_only_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let catalog = Catalog::new(ContractType::Full, Vec::new())
        .map_err(|e| format!("build catalog: {e}"))?;

    let mut snap = storage
        .begin_snapshot()
        .await
        .map_err(|e| format!("begin: {e}"))?;
    storage
        .replace_catalog(&mut snap, catalog.clone())
        .await
        .map_err(|e| format!("replace: {e}"))?;
    let before = storage
        .get_catalog(ContractType::Full)
        .await
        .map_err(|e| format!("get before: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    let after = storage
        .get_catalog(ContractType::Full)
        .await
        .map_err(|e| format!("get after: {e}"))?;

    if before.is_some() {
        return Err("uncommitted catalog visible".into());
    }
    if after != Some(catalog) {
        return Err(format!("expected committed catalog, got {after:?}"));
    }
    Ok(())
}
