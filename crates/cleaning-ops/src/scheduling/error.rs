use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::auth::IdentityError;
use super::store::StoreError;

/// Error raised by the scheduling service and the lifecycle engine.
///
/// Every variant renders as `{ "error": <message> }`. Authorization and
/// unexpected failures hide their detail from the caller; the detail is
/// logged where the error is raised.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("authentication required")]
    Unauthenticated,
    #[error("not authorized: {reason}")]
    Forbidden { reason: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("cleaning was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl SchedulingError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SchedulingError::Validation { .. } => StatusCode::BAD_REQUEST,
            SchedulingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SchedulingError::Forbidden { .. } => StatusCode::FORBIDDEN,
            SchedulingError::NotFound { .. } => StatusCode::NOT_FOUND,
            SchedulingError::Conflict { .. } => StatusCode::CONFLICT,
            SchedulingError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            SchedulingError::Store(_) | SchedulingError::Identity(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand back to the caller.
    pub fn public_message(&self) -> String {
        match self {
            SchedulingError::Forbidden { .. } => "not authorized".to_string(),
            SchedulingError::Store(StoreError::Conflict { expected, actual }) => {
                SchedulingError::Conflict {
                    expected: *expected,
                    actual: *actual,
                }
                .to_string()
            }
            SchedulingError::Store(_) | SchedulingError::Identity(_) => {
                "unexpected error, please retry later".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "scheduling request failed");
        }

        let body = Json(json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
