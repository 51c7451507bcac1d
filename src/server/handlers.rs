// HTTP request handlers
// Author: kelexine (https://github.com/kelexine)

use super::routes::AppState;
use crate::context::ProcessingMethod;
use crate::error::ServiceError;
use crate::metrics;
use crate::models::{ChatMessage, ChatMode, ChatRequest, RoastLevel};
use crate::utils::logging::preview;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info};

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub mode: ChatMode,

    #[serde(default)]
    pub roast_level: RoastLevel,

    /// Lets clients opt out of the background worker.
    #[serde(default = "default_use_async")]
    pub use_async: bool,
}

fn default_use_async() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub success: bool,
    pub processing_time: f64,
    pub processing_method: &'static str,
    pub queue_size: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearCacheBody {
    #[serde(default)]
    clear_queue: bool,
}

/// Handler for `POST /api/chat`
pub async fn chat_handler(
    State(state): State<AppState>,
    body: String, // Raw JSON so parse errors map onto our envelope
) -> Result<Response, ServiceError> {
    let start = Instant::now();

    let req: ChatBody = serde_json::from_str(&body).map_err(|e| {
        debug!("Rejected chat body: {}", preview(&body, 200));
        ServiceError::InvalidRequest(format!("Invalid request body: {}", e))
    })?;

    if req.messages.is_empty() {
        return Err(ServiceError::InvalidRequest("No messages provided".to_string()));
    }
    let max_messages = state.config.server.max_messages;
    if req.messages.len() > max_messages {
        return Err(ServiceError::InvalidRequest(format!(
            "Too many messages: {} (limit {})",
            req.messages.len(),
            max_messages
        )));
    }

    let method = state.choose_method(req.use_async);
    info!(
        "Processing chat request - Mode: {}, Roast Level: {}, Method: {}",
        req.mode,
        req.roast_level,
        method.as_str()
    );

    let request = ChatRequest::new(req.messages, req.mode, req.roast_level);
    let result = state.process_chat(request, method).await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(message) => {
            info!(
                "Request processed in {:.2} seconds via {}",
                elapsed,
                method.as_str()
            );
            metrics::record_request(method.as_str(), 200, elapsed);

            Ok(Json(ChatResponse {
                message,
                success: true,
                processing_time: (elapsed * 100.0).round() / 100.0,
                processing_method: method.as_str(),
                queue_size: match method {
                    ProcessingMethod::Hybrid => state.queue_len(),
                    ProcessingMethod::Sync => 0,
                },
            })
            .into_response())
        }
        Err(e) => {
            metrics::record_request(method.as_str(), e.status_code().as_u16(), elapsed);
            let mut response = e.into_response();
            response.headers_mut().insert(
                "x-processing-method",
                header::HeaderValue::from_static(method.as_str()),
            );
            Ok(response)
        }
    }
}

/// Handler for `GET /api/health`
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let worker_alive = state.worker_alive();

    Json(json!({
        "status": if worker_alive { "healthy" } else { "degraded" },
        "message": "AI Chat Backend is running",
        "uptime_secs": state.uptime_secs(),
        "gateway_pool": {
            "in_use": state.pool_in_use(),
            "max_workers": state.pool_size(),
        },
        "async_processing": {
            "worker_alive": worker_alive,
            "worker_state": state.worker.state(),
            "queue_size": state.queue_len(),
            "in_flight": state.worker.in_flight(),
            "active_requests": state.active_requests(),
        },
        "cache": {
            "entries": state.cache_len(),
            "stats": state.cache.stats(),
        },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Handler for `GET /api/metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "cache_size": state.cache_len(),
        "active_threads": state.pool_in_use(),
        "max_workers": state.pool_size(),
        "async_queue_size": state.queue_len(),
        "async_thread_alive": state.worker_alive(),
        "active_requests": state.active_requests(),
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

/// Handler for `GET /metrics` (Prometheus text exposition)
pub async fn prometheus_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Handler for `GET /api/processing-stats`
pub async fn processing_stats_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let queue_len = state.queue_len();
    let queue_utilization = (queue_len as f64 / state.queue.capacity() as f64).min(1.0);
    let pool_utilization = state.pool_in_use() as f64 / state.pool_size().max(1) as f64;

    Json(json!({
        "total_cache_entries": state.cache_len(),
        "async_queue_length": queue_len,
        "async_queue_capacity": state.queue.capacity(),
        "thread_pool_size": state.pool_size(),
        "active_threads": state.pool_in_use(),
        "async_thread_status": if state.worker_alive() { "alive" } else { "dead" },
        "async_processor_status": state.worker.state(),
        "upstream_in_flight": state.worker.in_flight(),
        "upstream_concurrency_limit": state.worker.concurrency_limit(),
        "system_load": {
            "queue_utilization": queue_utilization,
            "pool_utilization": pool_utilization,
        },
    }))
}

/// Handler for `POST /api/restart-async`
pub async fn restart_async_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.restart_worker().await;

    Json(json!({
        "success": state.worker_alive(),
        "message": "Async processing worker restarted",
    }))
}

/// Handler for `POST /api/clear-cache`
pub async fn clear_cache_handler(State(state): State<AppState>, body: String) -> Response {
    // Body is optional; anything unparseable means "cache only"
    let req: ClearCacheBody = serde_json::from_str(&body).unwrap_or_default();
    let report = state.clear_cache(req.clear_queue);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": format!("Cache cleared. Removed {} entries.", report.cache_entries),
            "queue_cleared": report.queue_entries,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_body_defaults() {
        let body: ChatBody = serde_json::from_str(r#"{"messages":[{"role":"user","content":"hi"}]}"#).unwrap();
        assert_eq!(body.mode, ChatMode::ConvinceAi);
        assert_eq!(body.roast_level.get(), 5);
        assert!(body.use_async);
    }

    #[test]
    fn test_chat_body_camel_case_fields() {
        let body: ChatBody = serde_json::from_str(
            r#"{"messages":[],"mode":"prove-human","roastLevel":9,"useAsync":false}"#,
        )
        .unwrap();
        assert_eq!(body.mode, ChatMode::ProveHuman);
        assert_eq!(body.roast_level.get(), 9);
        assert!(!body.use_async);
    }

    #[test]
    fn test_chat_body_rejects_out_of_range_level() {
        let result = serde_json::from_str::<ChatBody>(r#"{"messages":[],"roastLevel":11}"#);
        assert!(result.is_err());
    }
}
