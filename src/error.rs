use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed input, rejected before any mutation (bad quantity, bad email).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transition not permitted from the license's current status.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Concurrent modification or uniqueness violation; re-fetch and retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// User directory lookup failed; terminal for that one batch item.
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Store timed out; safe to retry with the same idempotency key.
    #[error("Retryable error: {0}")]
    Retryable(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        // A busy/locked store is a bounded-timeout condition the caller may
        // retry with the same idempotency key; everything else is internal.
        if let rusqlite::Error::SqliteFailure(code, _) = &e {
            if matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return AppError::Retryable("store busy, retry the command".into());
            }
        }
        AppError::Database(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation error", Some(msg.clone()))
            }
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "Invalid state", Some(msg.clone()))
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::Resolution(msg) => {
                (StatusCode::BAD_GATEWAY, "Resolution error", Some(msg.clone()))
            }
            AppError::Retryable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Retryable error", Some(msg.clone()))
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse { error, details };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Shorthand for the common `Option -> NotFound` lift in handlers.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.into()))
    }
}

/// Shared user-facing message constants.
pub mod msg {
    pub const LICENSE_NOT_FOUND: &str = "License not found";
    pub const USER_ALREADY_LICENSED: &str = "User already holds a license in this company";
    pub const QUANTITY_OUT_OF_RANGE: &str = "Quantity must be between 1 and 1000";
    pub const INVALID_EMAIL: &str = "Invalid email address";
    pub const INVALID_USER_ID: &str = "Malformed user id";
    pub const INVALID_LICENSE_ID: &str = "Malformed license id";
    pub const VERSION_CONFLICT: &str = "License was modified concurrently, re-fetch and retry";
}
