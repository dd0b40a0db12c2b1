//! HTTP middleware and extractors: rate limiting, API key authentication,
//! and the caller identity asserted by the upstream identity provider.

use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pact_core::{Principal, Role};

use super::json_error;
use super::state::AppState;

pub(crate) const SUBJECT_HEADER: &str = "x-pact-subject";
pub(crate) const ROLE_HEADER: &str = "x-pact-role";

/// Rate limiting middleware. Checks per-IP request rate before routing.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.rate_limiter.check(addr.ip()).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(client = %addr.ip(), retry_after, "Rate limit exceeded");
            let body = serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded",
                "retry_after": retry_after,
            });
            (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
        }
    }
}

/// API key authentication middleware.
///
/// When a key is configured, every request except `/health` must carry
/// `Authorization: Bearer <key>` or `X-API-Key: <key>`.
pub(crate) async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected_key) = &state.api_key else {
        return next.run(request).await;
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let headers = request.headers();
    let presented = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()));

    match presented {
        Some(key) if key == expected_key => next.run(request).await,
        Some(_) => json_error(StatusCode::FORBIDDEN, "invalid API key").into_response(),
        None => json_error(StatusCode::UNAUTHORIZED, "authentication required").into_response(),
    }
}

/// The authenticated caller, read from `X-Pact-Subject` and `X-Pact-Role`.
///
/// The role defaults to `partner` when the header is absent.
pub(crate) struct Identity(pub(crate) Principal);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let Some(subject) = header(SUBJECT_HEADER) else {
            return Err(
                json_error(StatusCode::UNAUTHORIZED, "missing X-Pact-Subject header")
                    .into_response(),
            );
        };
        let role = match header(ROLE_HEADER) {
            None => Role::Partner,
            Some(raw) => raw.parse::<Role>().map_err(|e| {
                json_error(StatusCode::BAD_REQUEST, &e).into_response()
            })?,
        };
        Ok(Identity(Principal {
            subject: subject.to_string(),
            role,
        }))
    }
}
