use crate::db::StoreError;
use crate::translation::ResolveError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("FAQ not found")]
    NotFound,

    #[error("Invalid or missing API key")]
    Unauthorized,

    #[error(transparent)]
    Translation(#[from] ResolveError),

    #[error(transparent)]
    Store(StoreError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => ApiError::Validation(message),
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Translation(ResolveError::Storage(e))
                if matches!(**e, StoreError::NotFound(_)) =>
            {
                StatusCode::NOT_FOUND
            }
            ApiError::Translation(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
