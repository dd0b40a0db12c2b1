//! `pact serve` -- HTTP JSON API over the agreement engine.
//!
//! Security features:
//! - Optional API key authentication (`[server] api_key` or `PACT_API_KEY`)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - CORS headers on all responses
//! - Request body size limit
//!
//! Caller identity comes from the upstream identity provider as
//! `X-Pact-Subject` / `X-Pact-Role` headers and is trusted as supplied.
//!
//! Endpoints:
//! - GET  /health                                  - Server status (exempt from auth)
//! - GET  /catalog/{contract_type}                 - Ordered deliverables and options
//! - PUT  /catalog/{contract_type}                 - Replace a catalog (admin)
//! - POST /partners                                - Register a partner (admin)
//! - GET  /partners/{id}/status                    - Lifecycle flags
//! - POST /partners/{id}/read                      - Mark agreement read
//! - POST /partners/{id}/sign                      - Mark agreement signed
//! - POST /partners/{id}/configuration/begin       - Start configuring
//! - GET  /partners/{id}/selections                - Current selections
//! - PUT  /partners/{id}/selections                - Replace selections
//! - POST /partners/{id}/configuration/finalize    - Check completeness
//! - POST /partners/{id}/submit                    - Submit with final signature
//! - POST /partners/{id}/reconfiguration           - Request reconfiguration
//! - GET  /partners/{id}/reconfiguration           - Request history
//! - GET  /reconfiguration                         - Pending requests (admin)
//! - GET  /reconfiguration/{request_id}            - One request
//! - POST /reconfiguration/{request_id}/approve    - Approve (admin)
//! - POST /reconfiguration/{request_id}/reject     - Reject (admin)
//! - GET  /indicators                              - Indicators
//! - GET  /indicators/{id}                         - One indicator
//! - POST /indicators/{id}/evaluate                - Target for a baseline
//! - PUT  /indicators/{id}/rules                   - Replace rule set (admin)
//!
//! All responses use Content-Type: application/json.

mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use self::handlers::*;
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::ServerConfig;
use crate::seed::Engine;

/// Maximum request body size: 1 MB.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Rate limit window.
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({
            "error": status.canonical_reason().unwrap_or("error").to_lowercase().replace(' ', "_"),
            "message": message,
        })),
    )
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/catalog/{contract_type}",
            get(handle_list_deliverables).put(handle_replace_catalog),
        )
        .route("/partners", post(handle_register_partner))
        .route("/partners/{id}/status", get(handle_status))
        .route("/partners/{id}/read", post(handle_mark_read))
        .route("/partners/{id}/sign", post(handle_mark_signed))
        .route(
            "/partners/{id}/configuration/begin",
            post(handle_begin_configuration),
        )
        .route(
            "/partners/{id}/configuration/finalize",
            post(handle_finalize),
        )
        .route(
            "/partners/{id}/selections",
            get(handle_get_selections).put(handle_record_selections),
        )
        .route("/partners/{id}/submit", post(handle_submit))
        .route(
            "/partners/{id}/reconfiguration",
            get(handle_history).post(handle_request_reconfiguration),
        )
        .route("/reconfiguration", get(handle_list_pending))
        .route("/reconfiguration/{request_id}", get(handle_get_request))
        .route("/reconfiguration/{request_id}/approve", post(handle_approve))
        .route("/reconfiguration/{request_id}/reject", post(handle_reject))
        .route("/indicators", get(handle_list_indicators))
        .route("/indicators/{id}", get(handle_get_indicator))
        .route("/indicators/{id}/evaluate", post(handle_evaluate))
        .route("/indicators/{id}/rules", axum::routing::put(handle_patch_rules))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `engine` until Ctrl+C.
pub(crate) async fn start_server(
    engine: Engine,
    server: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if server.api_key.is_some() {
        info!("API key authentication enabled");
    }
    info!(
        rate_limit = server.rate_limit,
        "Rate limit per client IP per minute"
    );

    let state = Arc::new(AppState {
        engine,
        rate_limiter: RateLimiter::new(server.rate_limit, RATE_LIMIT_WINDOW),
        api_key: server.api_key.clone(),
    });

    let addr = format!("0.0.0.0:{}", server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

/// Wait for Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
