//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lablib_engine::ErrorKind;
use serde::Serialize;

use crate::db::is_constraint_violation;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Engine(#[from] lablib_engine::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Category of the error in the circulation taxonomy, if it has one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            AppError::Database(e) if is_constraint_violation(e) => Some(ErrorKind::Conflict),
            AppError::Database(_) => Some(ErrorKind::Store),
            AppError::Engine(e) => Some(e.kind()),
            AppError::BadRequest(_) => Some(ErrorKind::Validation),
            AppError::Unauthorized(_) | AppError::Forbidden(_) | AppError::Internal(_) => None,
        }
    }

    /// HTTP status and machine-readable code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            _ => match self.kind() {
                Some(kind) => (status_for(kind), kind.code()),
                None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotAvailable | ErrorKind::NoOpenLoan | ErrorKind::Conflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::Store => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    /// The same request may succeed if resubmitted later.
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Storage unavailable, try again".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Engine(e) => {
                tracing::debug!(code, "Request rejected: {}", e);
                e.to_string()
            }
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Unauthorized(msg) | AppError::Forbidden(msg) => msg.to_string(),
        };
        let retryable = self.kind().is_some_and(ErrorKind::is_retryable);

        let body = Json(ErrorResponse {
            error,
            code,
            retryable,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
