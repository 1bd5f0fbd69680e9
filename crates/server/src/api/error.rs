//! Mapping of core errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use frontdesk_core::QueueError;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug)]
pub enum ApiError {
    Queue(QueueError),
    NotFound(String),
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Queue(err)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Queue(e) => match e {
                QueueError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                QueueError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
                QueueError::StoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
                QueueError::InvalidTransition { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match self {
            ApiError::NotFound(msg) => msg,
            ApiError::Queue(e) => {
                if status == StatusCode::SERVICE_UNAVAILABLE {
                    error!("Store failure: {}", e);
                }
                e.to_string()
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: message,
                kind,
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
