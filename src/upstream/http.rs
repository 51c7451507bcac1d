// OpenAI-compatible HTTP completion backend
// Author: kelexine (https://github.com/kelexine)

use super::CompletionBackend;
use crate::config::UpstreamConfig;
use crate::error::{Result, ServiceError};
use crate::models::{CompletionRequest, CompletionResponse};
use crate::utils::logging::{preview, sanitize};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

/// Backend that posts to `{api_base_url}/chat/completions`.
pub struct OpenAiBackend {
    http_client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .use_rustls_tls()
            .build()
            .map_err(|e| ServiceError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        debug!("Created upstream HTTP client for {}", config.api_base_url);

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Extract error message from API response JSON
    fn extract_error_message(response_text: &str) -> Option<String> {
        #[derive(serde::Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum ErrorDetail {
            Structured { message: Option<String> },
            Plain(String),
        }

        match serde_json::from_str::<ErrorResponse>(response_text).ok()?.error? {
            ErrorDetail::Structured { message } => message,
            ErrorDetail::Plain(message) => Some(message),
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        debug!(
            "POST {} (model={}, messages={})",
            self.endpoint,
            request.model,
            request.messages.len()
        );

        let mut builder = self.http_client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("HTTP error: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let message = Self::extract_error_message(&response_text)
                .unwrap_or_else(|| preview(&response_text, 300));
            let message = sanitize(&message);
            error!("Upstream API error: HTTP {} - {}", status, message);
            return Err(ServiceError::Upstream(format!("HTTP {}: {}", status, message)));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            error!(
                "Failed to parse upstream response: {} (body: {})",
                e,
                sanitize(&preview(&response_text, 300))
            );
            ServiceError::Upstream(format!("Response parsing error: {}", e))
        })
    }
}
