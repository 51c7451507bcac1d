// Hybrid dispatcher - background worker first, synchronous path as fallback
// Author: kelexine (https://github.com/kelexine)

use super::pipeline::CompletionPipeline;
use super::queue::{QueuedRequest, RequestQueue};
use super::worker::BackgroundWorker;
use crate::metrics;
use crate::models::{ChatRequest, Outcome};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Returned when even the synchronous path fails.
pub const CRASH_FALLBACK_MESSAGE: &str =
    "whoa my brain just had a full system crash... classic monday vibes 💀";

/// Why the worker path did not produce a message.
#[derive(Debug)]
enum WorkerFallback {
    Failure(String),
    Closed,
    Timeout(Duration),
}

impl WorkerFallback {
    fn label(&self) -> &'static str {
        match self {
            WorkerFallback::Failure(_) => "failure",
            WorkerFallback::Closed => "closed",
            WorkerFallback::Timeout(_) => "timeout",
        }
    }
}

impl fmt::Display for WorkerFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerFallback::Failure(reason) => write!(f, "worker returned error: {}", reason),
            WorkerFallback::Closed => f.write_str("worker dropped the reply channel"),
            WorkerFallback::Timeout(after) => write!(f, "no worker result after {:?}", after),
        }
    }
}

/// Primary entry point of the dispatch engine.
///
/// `dispatch` tries the background worker with an inner timeout and falls
/// back to running the pipeline directly; if that fails too, the caller
/// still gets [`CRASH_FALLBACK_MESSAGE`]. The returned outcome is always a
/// success.
pub struct HybridDispatcher {
    worker: Arc<BackgroundWorker>,
    queue: Arc<RequestQueue>,
    pipeline: Arc<CompletionPipeline>,
    async_timeout: Duration,
}

impl HybridDispatcher {
    pub fn new(
        worker: Arc<BackgroundWorker>,
        queue: Arc<RequestQueue>,
        pipeline: Arc<CompletionPipeline>,
        async_timeout: Duration,
    ) -> Self {
        Self {
            worker,
            queue,
            pipeline,
            async_timeout,
        }
    }

    pub async fn dispatch(&self, request: ChatRequest) -> Outcome {
        if self.worker.is_alive() {
            match self.dispatch_via_worker(request.clone()).await {
                Ok(message) => {
                    info!("Request processed via async path");
                    metrics::record_dispatch_path("worker");
                    return Outcome::Success(message);
                }
                Err(fallback) => {
                    warn!("{}, falling back to sync", fallback);
                    metrics::record_dispatch_fallback(fallback.label());
                }
            }
        } else {
            info!("Async processing unavailable, using sync");
            metrics::record_dispatch_fallback("unavailable");
        }

        self.dispatch_sync(request).await
    }

    /// Synchronous tier alone: run the pipeline on a task owned by this
    /// call, with no queue in between.
    pub async fn dispatch_sync(&self, request: ChatRequest) -> Outcome {
        info!("Using synchronous processing");
        let pipeline = self.pipeline.clone();
        let task = tokio::spawn(async move { pipeline.run(&request, "sync").await });

        match task.await {
            Ok(Outcome::Success(message)) => {
                metrics::record_dispatch_path("sync");
                Outcome::Success(message)
            }
            Ok(Outcome::Failure(reason)) => {
                error!("Synchronous processing failed: {}", reason);
                Self::crash_fallback()
            }
            Err(e) => {
                error!("Synchronous processing task failed: {}", e);
                Self::crash_fallback()
            }
        }
    }

    async fn dispatch_via_worker(&self, request: ChatRequest) -> Result<String, WorkerFallback> {
        let (item, reply) = QueuedRequest::new(request);
        self.queue.push(item);

        match tokio::time::timeout(self.async_timeout, reply).await {
            Ok(Ok(Outcome::Success(message))) => Ok(message),
            Ok(Ok(Outcome::Failure(reason))) => Err(WorkerFallback::Failure(reason)),
            Ok(Err(_)) => Err(WorkerFallback::Closed),
            Err(_) => Err(WorkerFallback::Timeout(self.async_timeout)),
        }
    }

    fn crash_fallback() -> Outcome {
        metrics::record_dispatch_path("crash_fallback");
        Outcome::Success(CRASH_FALLBACK_MESSAGE.to_string())
    }

    pub fn worker(&self) -> &Arc<BackgroundWorker> {
        &self.worker
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }
}
