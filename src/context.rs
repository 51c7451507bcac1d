//! Application context: every long-lived component, built once at startup.
//!
//! The gateway handlers receive an `Arc<AppContext>` as axum state; nothing in
//! the crate reaches for process-wide singletons (metrics aside).
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::cache::{ConversationFingerprint, ResponseCache};
use crate::config::AppConfig;
use crate::dispatch::{BackgroundWorker, CompletionPipeline, HybridDispatcher, RequestQueue};
use crate::error::{Result, ServiceError};
use crate::models::{ChatRequest, Outcome};
use crate::upstream::{CompletionBackend, OpenAiBackend, UpstreamClient};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Which tier a gateway request was submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMethod {
    /// Background worker first, synchronous fallback.
    Hybrid,
    /// Synchronous path only.
    Sync,
}

impl ProcessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::Hybrid => "hybrid",
            ProcessingMethod::Sync => "sync",
        }
    }
}

/// Counts removed by an administrative clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub cache_entries: usize,
    pub queue_entries: usize,
}

/// Decrements the active-request counter when dropped.
struct ActiveRequestGuard(Arc<AtomicUsize>);

impl ActiveRequestGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub cache: Arc<ResponseCache>,
    pub queue: Arc<RequestQueue>,
    pub upstream: Arc<UpstreamClient>,
    pub worker: Arc<BackgroundWorker>,
    pub dispatcher: Arc<HybridDispatcher>,
    gateway_pool: Arc<Semaphore>,
    active_requests: Arc<AtomicUsize>,
    started_at: Instant,
}

impl AppContext {
    /// Wire up all components around `backend`. The worker is not started.
    pub fn new(config: AppConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        let cache = Arc::new(ResponseCache::new(config.cache.clone()));
        let upstream = Arc::new(UpstreamClient::new(backend, &config.upstream));
        let queue = Arc::new(RequestQueue::new(config.dispatch.queue_capacity));
        let pipeline = Arc::new(CompletionPipeline::new(cache.clone(), upstream.clone()));
        let worker = Arc::new(BackgroundWorker::new(
            queue.clone(),
            pipeline.clone(),
            &config.dispatch,
        ));
        let dispatcher = Arc::new(HybridDispatcher::new(
            worker.clone(),
            queue.clone(),
            pipeline,
            config.dispatch.async_timeout(),
        ));

        Self {
            gateway_pool: Arc::new(Semaphore::new(config.server.gateway_pool_size)),
            active_requests: Arc::new(AtomicUsize::new(0)),
            started_at: Instant::now(),
            config,
            cache,
            queue,
            upstream,
            worker,
            dispatcher,
        }
    }

    /// Build the context around the HTTP backend described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let backend = OpenAiBackend::new(&config.upstream)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    pub fn start_worker(&self) -> bool {
        self.worker.start()
    }

    pub async fn restart_worker(&self) {
        self.worker.restart().await;
    }

    pub async fn shutdown(&self) {
        info!("Shutting down background worker...");
        self.worker.stop().await;
    }

    /// Hybrid when the client asks for it and the worker is up, sync otherwise.
    pub fn choose_method(&self, use_async: bool) -> ProcessingMethod {
        if use_async && self.worker.is_alive() {
            ProcessingMethod::Hybrid
        } else {
            ProcessingMethod::Sync
        }
    }

    /// Run one dispatcher call on the gateway pool, bounded by the outer
    /// timeout.
    ///
    /// The dispatch runs on its own task: on timeout it is abandoned, not
    /// cancelled, and may still populate the cache.
    pub async fn process_chat(&self, request: ChatRequest, method: ProcessingMethod) -> Result<String> {
        let dispatcher = self.dispatcher.clone();
        let pool = self.gateway_pool.clone();
        let active = self.active_requests.clone();

        let task = tokio::spawn(async move {
            let _permit = pool
                .acquire_owned()
                .await
                .map_err(|_| ServiceError::Internal("gateway pool closed".to_string()))?;
            let _active = ActiveRequestGuard::new(active);

            Ok::<_, ServiceError>(match method {
                ProcessingMethod::Hybrid => dispatcher.dispatch(request).await,
                ProcessingMethod::Sync => dispatcher.dispatch_sync(request).await,
            })
        });

        let sync_timeout = self.config.server.sync_timeout();
        match tokio::time::timeout(sync_timeout, task).await {
            Ok(Ok(Ok(Outcome::Success(message)))) => Ok(message),
            Ok(Ok(Ok(Outcome::Failure(reason)))) => {
                error!("Invalid response from processing ({}): {}", method.as_str(), reason);
                Err(ServiceError::Internal(reason))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => {
                error!("Request processing task failed ({}): {}", method.as_str(), e);
                Err(ServiceError::Internal(e.to_string()))
            }
            Err(_) => {
                error!(
                    "Request processing timeout ({}) after {}s",
                    method.as_str(),
                    sync_timeout.as_secs()
                );
                Err(ServiceError::Timeout(sync_timeout.as_secs()))
            }
        }
    }

    /// Cache key the pipeline will use for `request`.
    pub fn fingerprint(&self, request: &ChatRequest) -> ConversationFingerprint {
        ConversationFingerprint::new(
            request.mode,
            request.roast_level,
            &request.messages,
            self.config.cache.fingerprint_window,
        )
    }

    /// Empty the cache and, optionally, the pending queue.
    pub fn clear_cache(&self, clear_queue: bool) -> ClearReport {
        let cache_entries = self.cache.clear();
        let queue_entries = if clear_queue { self.queue.clear() } else { 0 };
        info!(
            "Cache cleared. Removed {} entries. Queue cleared: {} items.",
            cache_entries, queue_entries
        );
        ClearReport {
            cache_entries,
            queue_entries,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn worker_alive(&self) -> bool {
        self.worker.is_alive()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::SeqCst)
    }

    pub fn pool_size(&self) -> usize {
        self.config.server.gateway_pool_size
    }

    pub fn pool_in_use(&self) -> usize {
        self.pool_size()
            .saturating_sub(self.gateway_pool.available_permits())
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
