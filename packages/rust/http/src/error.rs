//! Mapping from [`FolioError`] to HTTP responses.

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use folio_shared::FolioError;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// A handler error carrying its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<FolioError> for ApiError {
    fn from(err: FolioError) -> Self {
        let status = match &err {
            FolioError::NotFound { .. } => StatusCode::NOT_FOUND,
            FolioError::Conflict { .. } => StatusCode::CONFLICT,
            FolioError::BadInput { .. } | FolioError::Validation { .. } => StatusCode::BAD_REQUEST,
            FolioError::Storage(_) | FolioError::Config { .. } | FolioError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
            return Self::new(status, "internal server error");
        }
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Parse a UUID-backed id from a path segment.
pub fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid UUID format"))
}
