// Response cache - TTL memoization of completions keyed by conversation fingerprint
// Author: kelexine (https://github.com/kelexine)

use crate::cache::models::{CacheEntry, CacheStats, ConversationFingerprint};
use crate::config::CacheConfig;
use crate::metrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// In-memory response cache shared by the background worker and the
/// synchronous dispatch path.
///
/// Expired entries are invisible to [`get`](Self::get) but stay in the map
/// until a [`compact`](Self::compact) pass removes them. Compaction only runs
/// after a `put` pushes the size past the configured threshold and removes at
/// most `compaction_batch` expired entries, so the size limit is soft.
pub struct ResponseCache {
    config: CacheConfig,
    entries: Mutex<HashMap<ConversationFingerprint, CacheEntry>>,
    stats: Mutex<CacheStats>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached message if its entry is younger than the TTL.
    pub fn get(&self, fingerprint: &ConversationFingerprint) -> Option<String> {
        let hit = self
            .entries
            .lock()
            .get(fingerprint)
            .filter(|entry| entry.is_fresh(self.config.ttl()))
            .map(|entry| entry.value.clone());

        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
            metrics::record_cache_hit();
            debug!("Cache hit: {}", fingerprint);
        } else {
            stats.misses += 1;
            metrics::record_cache_miss();
            debug!("Cache miss: {}", fingerprint);
        }
        hit
    }

    /// Store `message`, overwriting any previous entry, then compact if the
    /// cache has grown past the threshold.
    pub fn put(&self, fingerprint: ConversationFingerprint, message: String) {
        let len = {
            let mut entries = self.entries.lock();
            entries.insert(fingerprint, CacheEntry::new(message));
            entries.len()
        };
        self.stats.lock().stores += 1;
        metrics::record_cache_store();

        if len > self.config.compaction_threshold {
            self.compact();
        } else {
            metrics::update_cache_entries(len);
        }
    }

    /// Remove up to `compaction_batch` expired entries, in map iteration
    /// order. Returns how many were removed.
    pub fn compact(&self) -> usize {
        let ttl = self.config.ttl();
        let mut entries = self.entries.lock();

        let expired: Vec<ConversationFingerprint> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(ttl))
            .map(|(key, _)| key.clone())
            .take(self.config.compaction_batch)
            .collect();

        for key in &expired {
            entries.remove(key);
        }
        let remaining = entries.len();
        drop(entries);

        if !expired.is_empty() {
            debug!("Compacted {} expired cache entries, {} remain", expired.len(), remaining);
            self.stats.lock().compacted += expired.len() as u64;
            metrics::record_cache_compaction(expired.len());
        }
        metrics::update_cache_entries(remaining);
        expired.len()
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut entries = self.entries.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        metrics::update_cache_entries(0);
        debug!("Cache cleared ({} entries)", removed);
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, ChatMode, RoastLevel};
    use std::time::Duration;

    fn fingerprint(text: &str) -> ConversationFingerprint {
        ConversationFingerprint::new(
            ChatMode::ConvinceAi,
            RoastLevel::default(),
            &[ChatMessage::user(text)],
            3,
        )
    }

    fn small_cache() -> ResponseCache {
        ResponseCache::new(CacheConfig {
            ttl_secs: 300,
            compaction_threshold: 4,
            compaction_batch: 2,
            fingerprint_window: 3,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_then_get_within_ttl() {
        let cache = small_cache();
        cache.put(fingerprint("hi"), "yo bruh".to_string());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&fingerprint("hi")).as_deref(), Some("yo bruh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_absent_but_not_removed() {
        let cache = small_cache();
        cache.put(fingerprint("hi"), "yo bruh".to_string());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(cache.get(&fingerprint("hi")), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites() {
        let cache = small_cache();
        cache.put(fingerprint("hi"), "first".to_string());
        cache.put(fingerprint("hi"), "second".to_string());
        assert_eq!(cache.get(&fingerprint("hi")).as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compaction_removes_at_most_one_batch() {
        let cache = small_cache();
        for i in 0..4 {
            cache.put(fingerprint(&format!("old {}", i)), "stale".to_string());
        }
        tokio::time::advance(Duration::from_secs(301)).await;

        // Fifth entry crosses the threshold and triggers a compaction
        cache.put(fingerprint("fresh"), "new".to_string());

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().compacted, 2);
        assert_eq!(cache.get(&fingerprint("fresh")).as_deref(), Some("new"));
    }

    #[test]
    fn test_compaction_keeps_fresh_entries() {
        let cache = small_cache();
        for i in 0..6 {
            cache.put(fingerprint(&format!("msg {}", i)), "fresh".to_string());
        }
        assert_eq!(cache.len(), 6);
        assert_eq!(cache.compact(), 0);
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = small_cache();
        cache.put(fingerprint("a"), "1".to_string());
        cache.put(fingerprint("b"), "2".to_string());
        assert!(cache.get(&fingerprint("a")).is_some());
        assert!(cache.get(&fingerprint("zzz")).is_none());

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.stores, 2);
    }
}
