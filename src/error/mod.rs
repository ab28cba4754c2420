//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors surfaced by the HTTP API layer
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::DatabaseError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Errors from the remote IoT platform
///
/// `AuthExpired` (a 401 on a telemetry or RPC request) is retried exactly
/// once after invalidating the cached token; everything else degrades to an
/// error snapshot or a failed command result.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("platform login failed: {0}")]
    Unauthenticated(String),

    #[error("platform session expired")]
    AuthExpired,

    #[error("platform returned status {0}")]
    Status(u16),

    #[error("platform transport error: {0}")]
    Transport(String),
}
