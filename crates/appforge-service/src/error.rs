//! Structured error type for the HTTP surface.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is
//! the single place where error kinds map to status codes. Internal errors
//! are logged with context server-side and reach the client as a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Malformed client input.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or expired token.
    #[error("{0}")]
    Auth(String),

    /// Token valid but resource not owned.
    #[error("{0}")]
    Forbidden(String),

    /// Entity or file absent.
    #[error("{0}")]
    NotFound(String),

    /// A lifecycle state does not permit the requested transition.
    #[error("{0}")]
    Conflict(String),

    /// Port pool empty, storage full.
    #[error("{0}")]
    Exhausted(String),

    /// Provider error or proxy target down.
    #[error("{0}")]
    Upstream(String),

    /// Anything uncategorized.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Exhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound("not found".to_string()),
            rusqlite::Error::SqliteFailure(code, detail)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ApiError::Conflict(detail.unwrap_or_else(|| "constraint violation".to_string()))
            }
            other => ApiError::Internal(format!("database error: {other}")),
        }
    }
}

impl From<appforge::ProviderError> for ApiError {
    fn from(e: appforge::ProviderError) -> Self {
        use appforge::ProviderError;
        match e {
            ProviderError::MissingCredential { .. } | ProviderError::UnknownProvider { .. } => {
                ApiError::Validation(e.to_string())
            }
            ProviderError::InvalidRequest(m) => ApiError::Validation(m),
            ProviderError::Cancelled => ApiError::Conflict("stream cancelled".to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
