// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    CACHE_ENTRIES,
    CACHE_OPERATIONS,
    DISPATCH_FALLBACKS,
    DISPATCH_PATHS,
    QUEUE_DEPTH,
    QUEUE_EVENTS,
    REQUESTS_TOTAL,
    REQUEST_DURATION,
    UPSTREAM_CALLS,
    UPSTREAM_DURATION,
    WORKER_EVENTS,
};

/// Helper to record chat request metrics
pub fn record_request(processing_method: &str, status_code: u16, duration_secs: f64) {
    REQUESTS_TOTAL
        .with_label_values(&[processing_method, &status_code.to_string()])
        .inc();

    REQUEST_DURATION
        .with_label_values(&[processing_method])
        .observe(duration_secs);
}

/// Helper to record one upstream attempt
pub fn record_upstream_call(result: &str, duration_secs: f64) {
    UPSTREAM_CALLS.with_label_values(&[result]).inc();
    UPSTREAM_DURATION
        .with_label_values(&[result])
        .observe(duration_secs);
}

/// Helpers to record response cache operations
pub fn record_cache_hit() {
    CACHE_OPERATIONS.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_OPERATIONS.with_label_values(&["miss"]).inc();
}

pub fn record_cache_store() {
    CACHE_OPERATIONS.with_label_values(&["store"]).inc();
}

pub fn record_cache_compaction(removed: usize) {
    CACHE_OPERATIONS
        .with_label_values(&["compacted"])
        .inc_by(removed as f64);
}

pub fn update_cache_entries(count: usize) {
    CACHE_ENTRIES.set(count as f64);
}

/// Helpers to record background queue activity
pub fn update_queue_depth(depth: usize) {
    QUEUE_DEPTH.set(depth as f64);
}

pub fn record_queue_event(event: &str, count: usize) {
    QUEUE_EVENTS.with_label_values(&[event]).inc_by(count as f64);
}

/// Helper to record which tier resolved a dispatch
pub fn record_dispatch_path(path: &str) {
    DISPATCH_PATHS.with_label_values(&[path]).inc();
}

pub fn record_dispatch_fallback(reason: &str) {
    DISPATCH_FALLBACKS.with_label_values(&[reason]).inc();
}

pub fn record_worker_event(event: &str) {
    WORKER_EVENTS.with_label_values(&[event]).inc();
}
