// Retrying wrapper around the completion backend
// Author: kelexine (https://github.com/kelexine)

use super::CompletionBackend;
use crate::config::UpstreamConfig;
use crate::metrics;
use crate::models::{ChatMessage, CompletionRequest, Outcome};
use crate::utils::retry::{with_retry, RetryPolicy};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

/// Returned as a success when every attempt came back without content.
pub const DEGRADED_MESSAGE: &str = "yo my brain just went blank... try asking me something else? 🤔";

/// Separator the model sometimes emits before trailing reasoning or junk.
const CONTENT_DELIMITER: &str = "---";

/// Why a single attempt produced no usable text.
#[derive(Debug)]
enum AttemptError {
    Empty,
    Call(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Empty => f.write_str("empty response"),
            AttemptError::Call(detail) => f.write_str(detail),
        }
    }
}

/// Upstream client with a fixed attempt budget.
///
/// [`complete`](Self::complete) never fails past its boundary. It yields one of
/// three outcomes:
/// - normal success with the (normalized) model text,
/// - soft-degraded success with [`DEGRADED_MESSAGE`] when the last attempt
///   returned no content,
/// - [`Outcome::Failure`] when the last attempt raised an error.
pub struct UpstreamClient {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    retry: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &UpstreamConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            retry: RetryPolicy::new(config.retry_attempts, config.retry_delay()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub async fn complete(&self, conversation: Vec<ChatMessage>) -> Outcome {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: conversation,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let max_attempts = self.retry.max_attempts.max(1);

        let result = with_retry("Upstream completion", &self.retry, |attempt| {
            let request = &request;
            async move {
                info!(
                    "Calling upstream (attempt {}/{}), this may take a while...",
                    attempt, max_attempts
                );
                let start = Instant::now();
                let response = self.backend.create_completion(request).await;
                let elapsed = start.elapsed().as_secs_f64();

                match response {
                    Ok(resp) => match resp.first_content() {
                        Some(content) => {
                            info!("Upstream call completed in {:.2}s (attempt {})", elapsed, attempt);
                            metrics::record_upstream_call("success", elapsed);
                            Ok(normalize_content(content))
                        }
                        None => {
                            warn!("Upstream returned empty response on attempt {}", attempt);
                            metrics::record_upstream_call("empty", elapsed);
                            Err(AttemptError::Empty)
                        }
                    },
                    Err(e) => {
                        warn!("Upstream error on attempt {}: {}", attempt, e);
                        metrics::record_upstream_call("error", elapsed);
                        Err(AttemptError::Call(e.to_string()))
                    }
                }
            }
        })
        .await;

        match result {
            Ok(text) => Outcome::Success(text),
            Err(AttemptError::Empty) => Outcome::Success(DEGRADED_MESSAGE.to_string()),
            Err(AttemptError::Call(detail)) => Outcome::Failure(detail),
        }
    }
}

/// Cut the text at the first `---` and trim whitespace and brackets.
/// Text without the delimiter is returned verbatim.
pub fn normalize_content(content: &str) -> String {
    match content.split_once(CONTENT_DELIMITER) {
        Some((head, _)) => head
            .trim_matches(|c: char| matches!(c, ' ' | '\n' | '\t' | '[' | ']'))
            .to_string(),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_truncates_at_delimiter() {
        assert_eq!(normalize_content("partial answer --- trailing junk"), "partial answer");
        assert_eq!(normalize_content("[yo bruh]\n---\n<think>"), "yo bruh");
        assert_eq!(normalize_content("a --- b --- c"), "a");
    }

    #[test]
    fn test_normalize_keeps_text_without_delimiter() {
        assert_eq!(normalize_content("  [untouched]  "), "  [untouched]  ");
    }
}
