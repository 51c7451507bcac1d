//! Configuration data structures for the provit backend.
//!
//! This module defines the schema for the application settings: the HTTP
//! gateway, the upstream completion API, the dispatch engine, the response
//! cache and logging.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP gateway settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream completion API settings.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Background worker and dispatcher settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the HTTP gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    /// Default: `0.0.0.0`
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    /// Default: `4343`
    #[serde(default = "default_port")]
    pub port: u16,

    /// Longest conversation accepted by `/api/chat`.
    /// Default: `20`
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Number of dispatcher calls allowed to run at once.
    /// Default: `10`
    #[serde(default = "default_gateway_pool_size")]
    pub gateway_pool_size: usize,

    /// Outer bound on a whole dispatcher call, in seconds.
    /// Default: `75`
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,

    /// `/api/chat` requests allowed per client IP per minute; `0` disables.
    /// Default: `20`
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
}

/// Settings for the upstream OpenAI-compatible completion API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Optional bearer key. Falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model identifier sent with every call.
    /// Default: `deepseek-r1-distill-qwen-32b`
    #[serde(default = "default_model")]
    pub model: String,

    /// Default: `100`
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Default: `0.9`
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Total attempts per completion, including the first.
    /// Default: `2`
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Fixed pause before each retry, in seconds.
    /// Default: `2`
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Per-attempt HTTP timeout, in seconds.
    /// Default: `60`
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Settings for the hybrid dispatch engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// How long the dispatcher waits on the background worker, in seconds.
    /// Default: `60`
    #[serde(default = "default_async_timeout")]
    pub async_timeout_secs: u64,

    /// Simultaneous upstream calls issued by the background worker.
    /// Default: `20`
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Pending request capacity; the oldest entry is dropped on overflow.
    /// Default: `1000`
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Idle wait between empty-queue polls, in milliseconds.
    /// Default: `10`
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long `stop` waits for the worker loop to exit, in seconds.
    /// Default: `5`
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

/// Settings for the in-memory response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entry lifetime, in seconds.
    /// Default: `300`
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Size above which a `put` triggers compaction.
    /// Default: `100`
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: usize,

    /// Maximum expired entries removed per compaction.
    /// Default: `50`
    #[serde(default = "default_compaction_batch")]
    pub compaction_batch: usize,

    /// Number of trailing messages that feed the fingerprint.
    /// Default: `3`
    #[serde(default = "default_fingerprint_window")]
    pub fingerprint_window: usize,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl ServerConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

impl UpstreamConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl DispatchConfig {
    pub fn async_timeout(&self) -> Duration {
        Duration::from_secs(self.async_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// Default trait implementations linking to custom logic

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_messages: default_max_messages(),
            gateway_pool_size: default_gateway_pool_size(),
            sync_timeout_secs: default_sync_timeout(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            async_timeout_secs: default_async_timeout(),
            concurrency_limit: default_concurrency_limit(),
            queue_capacity: default_queue_capacity(),
            poll_interval_ms: default_poll_interval(),
            join_timeout_secs: default_join_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            compaction_threshold: default_compaction_threshold(),
            compaction_batch: default_compaction_batch(),
            fingerprint_window: default_fingerprint_window(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4343
}

fn default_max_messages() -> usize {
    20
}

fn default_gateway_pool_size() -> usize {
    10
}

fn default_sync_timeout() -> u64 {
    75
}

fn default_rate_limit_per_minute() -> u32 {
    20
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:1337/v1".to_string()
}

fn default_model() -> String {
    "deepseek-r1-distill-qwen-32b".to_string()
}

fn default_max_tokens() -> u32 {
    100
}

fn default_temperature() -> f32 {
    0.9
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    60
}

fn default_async_timeout() -> u64 {
    60
}

fn default_concurrency_limit() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_poll_interval() -> u64 {
    10
}

fn default_join_timeout() -> u64 {
    5
}

fn default_cache_ttl() -> u64 {
    300 // 5 minutes
}

fn default_compaction_threshold() -> usize {
    100
}

fn default_compaction_batch() -> usize {
    50
}

fn default_fingerprint_window() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
