use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Invariant violations raised by the connection registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(Uuid),
}

/// Close code and reason sent to a peer when the server ends its connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: &'static str,
}

impl CloseReason {
    /// Upgrade arrived on a path other than the chat path
    pub const INVALID_URL: CloseReason = CloseReason {
        code: 4000,
        reason: "Invalid URL",
    };

    /// Identity token missing or undecodable
    pub const INVALID_USER: CloseReason = CloseReason {
        code: 4001,
        reason: "Invalid user",
    };

    pub const GOING_AWAY: CloseReason = CloseReason {
        code: 1001,
        reason: "Server shutting down",
    };
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, generic) = match &self {
            AppError::Config(_) => ("CONFIG_ERROR", "Configuration error"),
            AppError::Metrics(_) => ("METRICS_ERROR", "Failed to encode metrics"),
            AppError::Internal(_) => ("INTERNAL_ERROR", "Internal server error"),
        };
        let log_message = self.to_string();
        let client_message = if is_production() {
            generic.to_string()
        } else {
            log_message.clone()
        };

        // Always log the detailed error server-side
        tracing::error!(code = %code, message = %log_message, "API error");

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reasons_are_distinct() {
        assert_ne!(CloseReason::INVALID_URL.code, CloseReason::INVALID_USER.code);
        assert_eq!(CloseReason::INVALID_URL.reason, "Invalid URL");
        assert_eq!(CloseReason::INVALID_USER.reason, "Invalid user");
    }

    #[test]
    fn test_app_error_is_internal_server_error() {
        let response = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
