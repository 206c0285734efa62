//! Error types for Foliopage
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` and renders the uniform error envelope:
//!
//! ```json
//! { "errorMessage": "...", "errorCode": 400, "errorData": { ... } }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found (404)
    #[error("not found")]
    NotFound,

    /// Authentication required (401)
    #[error("not logged in")]
    Unauthorized,

    /// Route exists but not for this HTTP method (405)
    #[error("method not allowed")]
    MethodNotAllowed,

    /// OAuth callback state did not match an issued value (401)
    #[error("invalid OAuth state")]
    InvalidOAuthState,

    /// Validation error (400)
    #[error("{0}")]
    Validation(String),

    /// Error carrying a status and structured payload for the client
    #[error("{message}")]
    Detailed {
        status: StatusCode,
        message: String,
        data: serde_json::Value,
    },

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Identity provider error (502)
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Object storage error (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Serialized error envelope
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub error_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_data: Option<serde_json::Value>,
}

impl AppError {
    /// Status code, client-facing message, metric label, and optional payload
    fn parts(&self) -> (StatusCode, String, &'static str, Option<serde_json::Value>) {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), "not_found", None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                "unauthorized",
                None,
            ),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                self.to_string(),
                "method_not_allowed",
                None,
            ),
            AppError::InvalidOAuthState => (
                StatusCode::UNAUTHORIZED,
                self.to_string(),
                "invalid_oauth_state",
                None,
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "validation", None),
            AppError::Detailed {
                status,
                message,
                data,
            } => (*status, message.clone(), "detailed", Some(data.clone())),
            AppError::Provider(msg) => (StatusCode::BAD_GATEWAY, msg.clone(), "provider", None),
            AppError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                "database",
                None,
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Storage error".to_string(),
                "storage",
                None,
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "config", None),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                "internal",
                None,
            ),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts().0
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error envelope.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message, error_type, error_data) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = ErrorBody {
            error_message,
            error_code: status.as_u16(),
            error_data,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
