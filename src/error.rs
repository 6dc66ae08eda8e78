//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No copies available: {0}")]
    Unavailable(String),

    #[error("Duplicate active loan: {0}")]
    DuplicateActiveLoan(String),

    #[error("Reissue limit exceeded: {0}")]
    ReissueLimitExceeded(String),

    /// Lease contention or a lost optimistic-concurrency race.
    /// The only kind a caller should retry automatically.
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Loan is overdue: {0}")]
    Overdue(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable error kind
    pub error: String,
    pub message: String,
    /// Whether the caller may retry the same request unchanged
    pub retryable: bool,
}

impl AppError {
    /// Stable slug used in response bodies and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Unavailable(_) => "unavailable",
            AppError::DuplicateActiveLoan(_) => "duplicate_active_loan",
            AppError::ReissueLimitExceeded(_) => "reissue_limit_exceeded",
            AppError::Busy(_) => "busy",
            AppError::Overdue(_) => "overdue",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::InvalidState(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::DuplicateActiveLoan(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::ReissueLimitExceeded(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Busy(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Overdue(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let retryable = matches!(self, AppError::Busy(_));

        let body = Json(ErrorResponse {
            error: self.kind().to_string(),
            message,
            retryable,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
