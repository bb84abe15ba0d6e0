//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::{ActivityError, FailureKind};
use state_store::StateStoreError;
use thiserror::Error;

/// Worker-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// An activity could not be run or failed.
    #[error(transparent)]
    Activity(#[from] ActivityError),
    /// The state store rejected a catalog operation.
    #[error(transparent)]
    Store(#[from] StateStoreError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Activity(ActivityError::NotRegistered(_)) => StatusCode::NOT_FOUND,
            ApiError::Activity(err) => match err.kind() {
                FailureKind::Terminal => StatusCode::UNPROCESSABLE_ENTITY,
                FailureKind::Retryable => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Store(StateStoreError::InvalidOperation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(err) if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StateStoreError::VersionConflict { .. }) => StatusCode::CONFLICT,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retryable(&self) -> bool {
        match self {
            ApiError::Activity(err) => err.is_retryable(),
            ApiError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
            "retryable": self.retryable(),
        });
        (status, axum::Json(body)).into_response()
    }
}
