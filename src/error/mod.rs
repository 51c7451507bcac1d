// Error types for the provit backend
// Author: kelexine (https://github.com/kelexine)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Rate limit exceeded: {0} requests per minute")]
    RateLimited(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Config parsing error: {0}")]
    ConfigParsing(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status the gateway reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) | ServiceError::Json(_) => StatusCode::BAD_REQUEST,
            ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Upstream(_) | ServiceError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Convert ServiceError to the JSON error envelope the chat frontend expects
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            ServiceError::Timeout(secs) => json!({
                "error": format!(
                    "Request timed out after {}s. The AI upstream is being slow today - please try again in a moment.",
                    secs
                ),
                "success": false,
                "timeout_duration": secs,
                "retry_suggestion": "the upstream can be slow - please wait a moment and try again",
            }),
            ServiceError::RateLimited(limit) => json!({
                "error": format!(
                    "Too many requests - limit is {} per minute. Take a breather and try again.",
                    limit
                ),
                "success": false,
            }),
            ServiceError::InvalidRequest(msg) => json!({
                "error": msg,
                "success": false,
            }),
            ServiceError::Json(e) => json!({
                "error": format!("Malformed request body: {}", e),
                "success": false,
            }),
            // Internal details stay in the logs
            _ => json!({
                "error": "Internal server error. Please try again.",
                "success": false,
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
