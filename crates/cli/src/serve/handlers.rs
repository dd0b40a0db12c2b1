//! Route handlers. Each handler resolves the caller, delegates to the
//! engine and maps the outcome; no domain rule is decided here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use pact_core::{
    AdminScope, CalculationRule, Catalog, ContractType, Deliverable, FinalSignature, NotFound,
    PactError, PartnerStatus, Principal, ReconfigurationRequest, Role, SelectionInput, SelectionView,
};
use pact_eval::Evaluation;
use pact_storage::IndicatorRecord;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::error::ApiError;
use super::json_error;
use super::middleware::Identity;
use super::state::AppState;

type Shared = State<Arc<AppState>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Partners may act only on their own agreement; admins on any.
fn authorize_partner(principal: &Principal, partner_id: &str) -> Result<(), PactError> {
    if principal.role == Role::Admin || principal.subject == partner_id {
        return Ok(());
    }
    Err(PactError::Permission {
        role: principal.role.as_str().to_string(),
        action: format!("act for partner '{}'", partner_id),
    })
}

/// Another partner's request reads exactly like an unknown id.
fn visible_request(
    principal: &Principal,
    request: ReconfigurationRequest,
) -> Result<ReconfigurationRequest, PactError> {
    match authorize_partner(principal, &request.partner_id) {
        Ok(()) => Ok(request),
        Err(_) => Err(NotFound::ReconfigurationRequest(request.id).into()),
    }
}

fn contract_type(raw: &str) -> Result<ContractType, PactError> {
    raw.parse()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

// ── Catalog ──────────────────────────────────────────────────────────

/// GET /catalog/{contract_type}
pub(crate) async fn handle_list_deliverables(
    State(state): Shared,
    Identity(who): Identity,
    Path(raw): Path<String>,
) -> ApiResult<Catalog> {
    let fail = |e| ApiError::for_principal(e, &who);
    let ct = contract_type(&raw).map_err(fail)?;
    let catalog = state.engine.list_deliverables(ct).await.map_err(fail)?;
    Ok(Json(catalog.as_ref().clone()))
}

/// PUT /catalog/{contract_type}
pub(crate) async fn handle_replace_catalog(
    State(state): Shared,
    Identity(who): Identity,
    Path(raw): Path<String>,
    Json(deliverables): Json<Vec<Deliverable>>,
) -> ApiResult<Catalog> {
    let fail = |e| ApiError::for_principal(e, &who);
    let ct = contract_type(&raw).map_err(fail)?;
    let catalog = state
        .engine
        .replace_catalog(&who, ct, deliverables)
        .await
        .map_err(fail)?;
    Ok(Json(catalog.as_ref().clone()))
}

// ── Partner lifecycle ────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct RegisterBody {
    id: String,
    contract_type: ContractType,
}

/// POST /partners
pub(crate) async fn handle_register_partner(
    State(state): Shared,
    Identity(who): Identity,
    Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<PartnerStatus>), ApiError> {
    let fail = |e| ApiError::for_principal(e, &who);
    who.require_admin("register partners").map_err(fail)?;
    let status = state
        .engine
        .register_partner(&body.id, body.contract_type)
        .await
        .map_err(fail)?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /partners/{id}/status
pub(crate) async fn handle_status(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.status(&id).await.map_err(fail)?))
}

/// POST /partners/{id}/read
pub(crate) async fn handle_mark_read(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.mark_read(&id).await.map_err(fail)?))
}

/// POST /partners/{id}/sign
pub(crate) async fn handle_mark_signed(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.mark_signed(&id).await.map_err(fail)?))
}

/// POST /partners/{id}/configuration/begin
pub(crate) async fn handle_begin_configuration(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(
        state.engine.begin_configuration(&id).await.map_err(fail)?,
    ))
}

/// POST /partners/{id}/configuration/finalize
pub(crate) async fn handle_finalize(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(
        state.engine.finalize_configuration(&id).await.map_err(fail)?,
    ))
}

/// POST /partners/{id}/submit
pub(crate) async fn handle_submit(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
    Json(signature): Json<FinalSignature>,
) -> ApiResult<PartnerStatus> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.submit(&id, signature).await.map_err(fail)?))
}

// ── Selection ledger ─────────────────────────────────────────────────

/// GET /partners/{id}/selections
pub(crate) async fn handle_get_selections(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<Vec<SelectionView>> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.get_selections(&id).await.map_err(fail)?))
}

/// PUT /partners/{id}/selections
pub(crate) async fn handle_record_selections(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
    Json(inputs): Json<Vec<SelectionInput>>,
) -> ApiResult<Vec<SelectionView>> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(
        state
            .engine
            .record_selections(&id, &inputs)
            .await
            .map_err(fail)?,
    ))
}

// ── Reconfiguration ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub(crate) struct ReasonBody {
    reason: String,
}

/// POST /partners/{id}/reconfiguration
pub(crate) async fn handle_request_reconfiguration(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
    Json(body): Json<ReasonBody>,
) -> Result<(StatusCode, Json<ReconfigurationRequest>), ApiError> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    let request = state
        .engine
        .request_reconfiguration(&id, &body.reason)
        .await
        .map_err(fail)?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /partners/{id}/reconfiguration
pub(crate) async fn handle_history(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<Vec<ReconfigurationRequest>> {
    let fail = |e| ApiError::for_principal(e, &who);
    authorize_partner(&who, &id).map_err(fail)?;
    Ok(Json(state.engine.history(&id).await.map_err(fail)?))
}

#[derive(Deserialize)]
pub(crate) struct ScopeQuery {
    contract_type: Option<ContractType>,
}

/// GET /reconfiguration?contract_type=
pub(crate) async fn handle_list_pending(
    State(state): Shared,
    Identity(who): Identity,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Vec<ReconfigurationRequest>> {
    let scope = query
        .contract_type
        .map(AdminScope::only)
        .unwrap_or_else(AdminScope::all);
    Ok(Json(
        state
            .engine
            .list_pending(&who, &scope)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

/// GET /reconfiguration/{request_id}
pub(crate) async fn handle_get_request(
    State(state): Shared,
    Identity(who): Identity,
    Path(request_id): Path<String>,
) -> ApiResult<ReconfigurationRequest> {
    let fail = |e| ApiError::for_principal(e, &who);
    let request = state.engine.get_request(&request_id).await.map_err(fail)?;
    Ok(Json(visible_request(&who, request).map_err(fail)?))
}

/// POST /reconfiguration/{request_id}/approve
pub(crate) async fn handle_approve(
    State(state): Shared,
    Identity(who): Identity,
    Path(request_id): Path<String>,
) -> ApiResult<ReconfigurationRequest> {
    Ok(Json(
        state
            .engine
            .approve(&who, &request_id)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

/// POST /reconfiguration/{request_id}/reject
pub(crate) async fn handle_reject(
    State(state): Shared,
    Identity(who): Identity,
    Path(request_id): Path<String>,
) -> ApiResult<ReconfigurationRequest> {
    Ok(Json(
        state
            .engine
            .reject(&who, &request_id)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

// ── Indicators ───────────────────────────────────────────────────────

/// GET /indicators?contract_type=
pub(crate) async fn handle_list_indicators(
    State(state): Shared,
    Identity(who): Identity,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Vec<IndicatorRecord>> {
    Ok(Json(
        state
            .engine
            .list_indicators(query.contract_type)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

/// GET /indicators/{id}
pub(crate) async fn handle_get_indicator(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
) -> ApiResult<IndicatorRecord> {
    Ok(Json(
        state
            .engine
            .get_indicator(&id)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

#[derive(Deserialize)]
pub(crate) struct EvaluateBody {
    baseline: Decimal,
}

/// POST /indicators/{id}/evaluate
pub(crate) async fn handle_evaluate(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
    Json(body): Json<EvaluateBody>,
) -> ApiResult<Evaluation> {
    Ok(Json(
        state
            .engine
            .evaluate_indicator(&id, body.baseline)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

/// PUT /indicators/{id}/rules
pub(crate) async fn handle_patch_rules(
    State(state): Shared,
    Identity(who): Identity,
    Path(id): Path<String>,
    Json(rules): Json<Vec<CalculationRule>>,
) -> ApiResult<IndicatorRecord> {
    Ok(Json(
        state
            .engine
            .patch_rules(&who, &id, rules)
            .await
            .map_err(|e| ApiError::for_principal(e, &who))?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partners_act_only_for_themselves() {
        assert!(authorize_partner(&Principal::partner("p-1"), "p-1").is_ok());
        assert!(authorize_partner(&Principal::admin("a-1"), "p-1").is_ok());
        let err = authorize_partner(&Principal::partner("p-2"), "p-1").unwrap_err();
        assert_eq!(err.kind(), "permission");
    }

    #[test]
    fn foreign_request_reads_as_unknown() {
        let request = ReconfigurationRequest {
            id: "r-1".into(),
            partner_id: "p-1".into(),
            contract_type: ContractType::Full,
            reason: "new lead".into(),
            status: pact_core::RequestStatus::Pending,
            created_at: "2025-06-01T00:00:00Z".into(),
            resolved_at: None,
            resolved_by: None,
        };

        let own = visible_request(&Principal::partner("p-1"), request.clone()).unwrap();
        assert_eq!(own, request);
        assert!(visible_request(&Principal::admin("a-1"), request.clone()).is_ok());

        let err = visible_request(&Principal::partner("p-2"), request).unwrap_err();
        assert_eq!(err, PactError::NotFound(NotFound::ReconfigurationRequest("r-1".into())));
    }
}
