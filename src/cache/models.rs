//! Cache key, entry and statistics models.

// Author: kelexine (https://github.com/kelexine)

use crate::models::{ChatMessage, ChatMode, RoastLevel};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Cache key derived from the tail of a conversation.
///
/// Only the last `window` messages contribute, so two conversations that end
/// the same way share an entry. Collisions are acceptable: the cache is a
/// best-effort memo, not an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationFingerprint(String);

impl ConversationFingerprint {
    pub fn new(mode: ChatMode, roast_level: RoastLevel, messages: &[ChatMessage], window: usize) -> Self {
        let tail = &messages[messages.len().saturating_sub(window)..];

        let mut hasher = Sha256::new();
        hasher.update(mode.as_str().as_bytes());
        hasher.update([0u8, roast_level.get(), 0u8]);
        hasher.update(serde_json::to_string(tail).unwrap_or_default().as_bytes());

        Self(format!("{}_{}_{:x}", mode, roast_level, hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationFingerprint {
    // Mode, level and a short hash prefix are enough for log lines
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.0.len().min(self.0.find('_').map(|i| i + 24).unwrap_or(self.0.len()));
        f.write_str(&self.0[..end])
    }
}

/// A memoized completion.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    pub created_at: Instant,
}

impl CacheEntry {
    pub fn new(value: String) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() < ttl
    }
}

/// Statistics for cache operations.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Number of fresh entries returned by `get`.
    pub hits: u64,
    /// Number of lookups that found nothing usable.
    pub misses: u64,
    /// Number of `put` calls.
    pub stores: u64,
    /// Number of expired entries removed by compaction.
    pub compacted: u64,
}
