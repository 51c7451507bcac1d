// Upstream completion API module
// Author: kelexine (https://github.com/kelexine)

mod client;
mod http;

pub use client::{normalize_content, UpstreamClient, DEGRADED_MESSAGE};
pub use http::OpenAiBackend;

use crate::error::Result;
use crate::models::{CompletionRequest, CompletionResponse};
use async_trait::async_trait;

/// A single call to the remote completion API.
///
/// Implementations make exactly one attempt; retry and fallback text live in
/// [`UpstreamClient`]. Any error is treated as transient.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}
