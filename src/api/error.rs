//! Errors raised by route handlers and their JSON rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::model::Envelope;
use crate::validate::ValidationError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Missing or empty required field.
    #[error("{0}")]
    Validation(String),

    /// Malformed body or query string.
    #[error("{0}")]
    Parse(String),

    /// Update/delete/read target does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Store failure. The message is generic; details are logged where raised.
    #[error("{0}")]
    Store(String),

    /// Non-success reply from the phones API, or no reply at all.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Parse(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { status, .. } => *status,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            // The proxy answers in the upstream's own shape, not the envelope.
            ApiError::Upstream { message, .. } => {
                (status, Json(json!({ "message": message }))).into_response()
            }
            other => {
                let body: Envelope<()> = Envelope::failure(other.to_string());
                (status, Json(body)).into_response()
            }
        }
    }
}
