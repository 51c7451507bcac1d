// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // REQUEST METRICS
    // ============================================================================

    /// Total number of chat requests handled by the gateway
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("chat_requests_total", "Total number of chat requests"),
        &["processing_method", "status_code"],
        REGISTRY
    ).unwrap();

    /// Request duration histogram (slow upstream, so wide buckets)
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("chat_request_duration_seconds", "Chat request duration in seconds")
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 75.0]),
        &["processing_method"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // UPSTREAM METRICS
    // ============================================================================

    /// Upstream completion attempts
    pub static ref UPSTREAM_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("upstream_calls_total", "Total upstream completion attempts"),
        &["result"], // result: success, empty, error
        REGISTRY
    ).unwrap();

    /// Upstream attempt duration
    pub static ref UPSTREAM_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("upstream_call_duration_seconds", "Upstream attempt duration")
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total response cache operations"),
        &["operation"], // operation: hit, miss, store, compacted
        REGISTRY
    ).unwrap();

    /// Current cache entries, expired ones included
    pub static ref CACHE_ENTRIES: Gauge = register_gauge_with_registry!(
        Opts::new("cache_entries_current", "Current number of cache entries"),
        REGISTRY
    ).unwrap();

    // ============================================================================
    // DISPATCH METRICS
    // ============================================================================

    /// Pending requests in the background queue
    pub static ref QUEUE_DEPTH: Gauge = register_gauge_with_registry!(
        Opts::new("dispatch_queue_depth", "Requests waiting for the background worker"),
        REGISTRY
    ).unwrap();

    /// Queue events
    pub static ref QUEUE_EVENTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("dispatch_queue_events_total", "Background queue events"),
        &["event"], // event: enqueued, evicted, cleared
        REGISTRY
    ).unwrap();

    /// Which tier resolved a dispatch
    pub static ref DISPATCH_PATHS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("dispatch_resolutions_total", "Dispatch calls by resolving path"),
        &["path"], // path: worker, sync, crash_fallback
        REGISTRY
    ).unwrap();

    /// Reasons the dispatcher left the worker path
    pub static ref DISPATCH_FALLBACKS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("dispatch_fallbacks_total", "Fallbacks from the worker path to the sync path"),
        &["reason"], // reason: unavailable, failure, closed, timeout
        REGISTRY
    ).unwrap();

    /// Background worker lifecycle events
    pub static ref WORKER_EVENTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("worker_events_total", "Background worker lifecycle events"),
        &["event"], // event: started, stopped, aborted, task_panicked, abandoned_pickup
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
