use std::future::Future;

use super::{make_partner, TestResult};
use crate::{PactStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "unknown_partner_not_found",
            unknown_partner_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "update_unknown_partner_not_found",
            update_unknown_partner_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "selections_of_unknown_partner_not_found",
            selections_of_unknown_partner_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "unknown_request_not_found",
            unknown_request_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "unknown_indicator_not_found",
            unknown_indicator_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "missing_catalog_is_none",
            missing_catalog_is_none(factory).await,
        ),
    ]
}

async fn unknown_partner_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_partner("ghost").await {
        Err(StorageError::PartnerNotFound { partner_id }) if partner_id == "ghost" => Ok(()),
        other => Err(format!("expected PartnerNotFound, got {other:?}")),
    }
}

async fn update_unknown_partner_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = storage
        .update_partner(&mut snap, 0, &make_partner("ghost"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::PartnerNotFound { .. }) => Ok(()),
        other => Err(format!("expected PartnerNotFound, got {other:?}")),
    }
}

async fn selections_of_unknown_partner_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.list_selections("ghost").await {
        Err(StorageError::PartnerNotFound { .. }) => Ok(()),
        other => Err(format!("expected PartnerNotFound, got {other:?}")),
    }
}

async fn unknown_request_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_reconfiguration_request("req-x").await {
        Err(StorageError::RequestNotFound { request_id }) if request_id == "req-x" => Ok(()),
        other => Err(format!("expected RequestNotFound, got {other:?}")),
    }
}

async fn unknown_indicator_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_indicator("ind-x").await {
        Err(StorageError::IndicatorNotFound { indicator_id }) if indicator_id == "ind-x" => Ok(()),
        other => Err(format!("expected IndicatorNotFound, got {other:?}")),
    }
}

async fn missing_catalog_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PactStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_catalog(pact_core::ContractType::Partial).await {
        Ok(None) => Ok(()),
        other => Err(format!("expected Ok(None), got {other:?}")),
    }
}
