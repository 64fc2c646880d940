use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Boundary error. Domain variants carry a stable machine-readable reason
/// tag next to the human message; callers branch on the tag only.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {message}")]
    Forbidden { reason: &'static str, message: String },

    #[error("Not Found: {message}")]
    NotFound { reason: &'static str, message: String },

    #[error("Validation error: {message}")]
    ValidationError { reason: &'static str, message: String },

    #[error("Conflict: {message}")]
    Conflict { reason: &'static str, message: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "unauthenticated",
            AppError::Forbidden { reason, .. }
            | AppError::NotFound { reason, .. }
            | AppError::ValidationError { reason, .. }
            | AppError::Conflict { reason, .. } => *reason,
            AppError::Database(_) => "storage_unavailable",
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Auth(msg) | AppError::Database(msg) => msg,
            AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::ValidationError { message, .. }
            | AppError::Conflict { message, .. } => message,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, self.message());
        } else {
            tracing::warn!("Request rejected: {} ({}): {}", status, self.reason(), self.message());
        }

        // Storage details stay in the log, not the response body.
        let message = match &self {
            AppError::Database(_) => "Appointment storage is temporarily unavailable",
            other => other.message(),
        };

        let body = Json(json!({
            "error": message,
            "reason": self.reason(),
        }));

        (status, body).into_response()
    }
}
