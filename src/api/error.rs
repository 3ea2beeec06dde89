//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::config::ConfigError;
use crate::error::EngineError;

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Invalid host or settings payload
    InvalidRequest(String),

    /// Unknown host
    NotFound(String),

    /// Settings could not be persisted
    StorageError(String),

    /// The engine is gone
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::StorageError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Config(ConfigError::UnknownHost(_)) => ApiError::NotFound(message),
            EngineError::Config(_) => ApiError::InvalidRequest(message),
            EngineError::Storage(_) => ApiError::StorageError(message),
            EngineError::EngineStopped => ApiError::Unavailable(message),
        }
    }
}
