//! Error types for Cinedash
//!
//! All request-level errors are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Cache and push failures have their own error types and never
//! reach this enum directly: they are logged and absorbed where they occur.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Whether 5xx bodies may carry the underlying error text.
///
/// Set once at startup from `server.environment`; production keeps it off.
static EXPOSE_ERROR_DETAILS: AtomicBool = AtomicBool::new(false);

/// Enable or disable internal error details in 5xx responses.
pub fn set_expose_error_details(enabled: bool) {
    EXPOSE_ERROR_DETAILS.store(enabled, Ordering::Relaxed);
}

fn expose_error_details() -> bool {
    EXPOSE_ERROR_DETAILS.load(Ordering::Relaxed)
}

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in a request. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced entity does not exist (404)
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Admin token missing or wrong (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Missing or malformed input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate resource or blocked by a relationship (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Build a validation error naming every missing field.
    pub fn missing_fields(fields: &[&str]) -> Self {
        AppError::Validation(format!("Missing required fields: {}", fields.join(", ")))
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Conflict(_) => "conflict",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body. Server-side failures never leak their
    /// cause unless error details are enabled.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        let body = if status.is_server_error() && expose_error_details() {
            serde_json::json!({
                "error": error_message,
                "detail": self.to_string(),
            })
        } else {
            serde_json::json!({
                "error": error_message,
            })
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
