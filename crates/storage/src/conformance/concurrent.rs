use std::future::Future;
use std::sync::Arc;

use pact_core::LifecycleState;

use super::{make_partner, make_request, seed_partner, TestResult};
use crate::{PactStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_partner_updates_exactly_one_wins",
            concurrent_partner_updates_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_pending_requests_exactly_one_wins",
            concurrent_pending_requests_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_updates_different_partners_all_succeed",
            concurrent_updates_different_partners_all_succeed(factory).await,
        ),
    ]
}

/// Count winners and losers from spawned tasks that return `Ok(won)`.
async fn tally(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StorageError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and try to move the same partner from
/// version 0. Exactly one commit succeeds; the rest see ConcurrentConflict
/// either when staging or when committing.
async fn concurrent_partner_updates_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_partner(storage.as_ref(), "p-1").await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut partner = make_partner("p-1");
            partner.state = LifecycleState::Read;
            match s.update_partner(&mut snap, 0, &partner).await {
                Ok(_) => match s.commit_snapshot(snap).await {
                    Ok(()) => Ok(true),
                    Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                    Err(e) => Err(e),
                },
                Err(StorageError::ConcurrentConflict { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let (winners, losers) = tally(handles).await?;
    if winners != 1 || losers != N - 1 {
        return Err(format!("expected 1 winner / {} losers, got {winners} / {losers}", N - 1));
    }

    let rec = storage
        .get_partner("p-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.version != 1 {
        return Err(format!("expected final version 1, got {}", rec.version));
    }
    Ok(())
}

/// N tasks race to open a reconfiguration request for the same partner.
async fn concurrent_pending_requests_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_partner(storage.as_ref(), "p-1").await?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let staged = s
                .insert_reconfiguration_request(&mut snap, make_request(&format!("req-{i}"), "p-1"))
                .await;
            let outcome = match staged {
                Ok(()) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match outcome {
                Ok(()) => Ok(true),
                Err(StorageError::UniqueViolation { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, _) = tally(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 pending request, {winners} committed"));
    }
    let pending = storage
        .list_reconfiguration_requests(Some("p-1"), Some(pact_core::RequestStatus::Pending))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if pending.len() != 1 {
        return Err(format!("expected 1 stored pending request, got {}", pending.len()));
    }
    Ok(())
}

async fn concurrent_updates_different_partners_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed_partner(storage.as_ref(), &format!("p-{i}")).await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut partner = make_partner(&format!("p-{i}"));
            partner.state = LifecycleState::Read;
            s.update_partner(&mut snap, 0, &partner).await?;
            s.commit_snapshot(snap).await?;
            Ok(true)
        }));
    }

    let (winners, _) = tally(handles).await?;
    if winners != N {
        return Err(format!("expected {N} successful updates, got {winners}"));
    }
    Ok(())
}
