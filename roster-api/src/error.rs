// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roster_store::{SqliteError, SyncError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] SqliteError),

    #[error(transparent)]
    Sync(#[from] SyncError<SqliteError>),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Store(_) | ApiError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Turn a failed write into `Conflict` when it violated a uniqueness constraint.
    pub fn from_write(err: SqliteError, conflict: impl FnOnce() -> String) -> Self {
        if err.is_unique_violation() {
            ApiError::Conflict(conflict())
        } else {
            ApiError::Store(err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            let source = std::error::Error::source(&self).map(ToString::to_string);
            error!(err = %self, ?source, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
