// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::{
    chat_handler, clear_cache_handler, health_handler, metrics_handler, processing_stats_handler,
    prometheus_handler, restart_async_handler,
};
use super::middleware::{cors_layer, request_id_layers};
use super::rate_limit::RateLimiterLayer;
use crate::context::AppContext;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub type AppState = Arc<AppContext>;

/// Chat transcripts are small; anything bigger is not a real client
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn create_router(context: AppState) -> Router {
    let (set_request_id, propagate_request_id) = request_id_layers();
    let chat_limiter = RateLimiterLayer::new(context.config.server.rate_limit_per_minute);

    Router::new()
        .route("/api/chat", post(chat_handler).layer(chat_limiter))
        .route("/api/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/processing-stats", get(processing_stats_handler))
        .route("/api/restart-async", post(restart_async_handler))
        .route("/api/clear-cache", post(clear_cache_handler))
        .route("/metrics", get(prometheus_handler))
        .layer(
            ServiceBuilder::new()
                .layer(set_request_id)
                .layer(propagate_request_id)
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                .map_response(|res: axum::response::Response<_>| res.map(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(context)
}
