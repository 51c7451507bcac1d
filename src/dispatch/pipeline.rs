// Cache-then-upstream completion pipeline shared by both dispatch tiers
// Author: kelexine (https://github.com/kelexine)

use crate::cache::{ConversationFingerprint, ResponseCache};
use crate::models::{ChatRequest, Outcome};
use crate::prompt;
use crate::upstream::UpstreamClient;
use std::sync::Arc;
use tracing::{error, info};

/// The per-request work done by the background worker and, identically, by
/// the synchronous fallback path.
pub struct CompletionPipeline {
    cache: Arc<ResponseCache>,
    upstream: Arc<UpstreamClient>,
}

impl CompletionPipeline {
    pub fn new(cache: Arc<ResponseCache>, upstream: Arc<UpstreamClient>) -> Self {
        Self { cache, upstream }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn fingerprint(&self, request: &ChatRequest) -> ConversationFingerprint {
        ConversationFingerprint::new(
            request.mode,
            request.roast_level,
            &request.messages,
            self.cache.config().fingerprint_window,
        )
    }

    /// Cache lookup, then upstream call, then cache write.
    ///
    /// `path` only labels log lines (`worker` or `sync`).
    pub async fn run(&self, request: &ChatRequest, path: &str) -> Outcome {
        let fingerprint = self.fingerprint(request);

        if let Some(cached) = self.cache.get(&fingerprint) {
            info!("Returning cached response ({})", path);
            return Outcome::Success(cached);
        }

        let conversation = prompt::build_conversation(request);

        match self.upstream.complete(conversation).await {
            Outcome::Success(message) if !message.trim().is_empty() => {
                self.cache.put(fingerprint, message.clone());
                Outcome::Success(message)
            }
            Outcome::Success(_) => {
                error!("Invalid upstream response ({}): empty text", path);
                Outcome::Failure("Invalid response from AI API".to_string())
            }
            Outcome::Failure(reason) => {
                error!("Upstream completion failed ({}): {}", path, reason);
                Outcome::Failure(reason)
            }
        }
    }
}
