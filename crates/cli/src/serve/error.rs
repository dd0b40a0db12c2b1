//! Mapping of engine errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pact_core::{PactError, Principal, Role};

/// An engine error on its way to the client.
pub(crate) struct ApiError {
    error: PactError,
    /// Whether internal details (rule-coverage gaps) may be shown.
    privileged: bool,
}

impl ApiError {
    /// Attach the caller's role so admin-only detail is shown to admins only.
    pub(crate) fn for_principal(error: PactError, principal: &Principal) -> Self {
        ApiError {
            error,
            privileged: principal.role == Role::Admin,
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match &self.error {
            PactError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PactError::StateConflict { .. }
            | PactError::DuplicateRequest { .. }
            | PactError::IncompleteConfiguration { .. } => StatusCode::CONFLICT,
            PactError::NotFound(_) => StatusCode::NOT_FOUND,
            PactError::Permission { .. } => StatusCode::FORBIDDEN,
            PactError::NoMatchingRule { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PactError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<PactError> for ApiError {
    fn from(error: PactError) -> Self {
        ApiError {
            error,
            privileged: false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.error {
            PactError::NoMatchingRule { .. } if !self.privileged => serde_json::json!({
                "error": self.error.kind(),
                "message": "no target could be computed for this baseline",
            }),
            PactError::Persistence(_) => serde_json::json!({
                "error": self.error.kind(),
                "message": "storage is unavailable, retry the same request",
            }),
            other => serde_json::json!({
                "error": other.kind(),
                "message": other.to_string(),
                "details": other.details(),
            }),
        };
        (status, Json(body)).into_response()
    }
}
