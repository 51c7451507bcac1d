// Background worker - drains the request queue under a concurrency limit
// Author: kelexine (https://github.com/kelexine)

use super::pipeline::CompletionPipeline;
use super::queue::{QueuedRequest, RequestQueue};
use crate::config::DispatchConfig;
use crate::metrics;
use crate::models::Outcome;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Running,
    Stopped,
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

impl RunningLoop {
    fn is_alive(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.join.is_finished()
    }
}

/// A single long-lived loop that pops queued requests and runs each one in
/// its own task, gated by a semaphore sized to the upstream concurrency
/// limit.
///
/// Per-request errors and panics are contained in the spawned task; only
/// [`stop`](Self::stop) ends the loop. Stopping does not drain the queue and
/// does not cancel requests already in flight.
pub struct BackgroundWorker {
    queue: Arc<RequestQueue>,
    pipeline: Arc<CompletionPipeline>,
    limiter: Arc<Semaphore>,
    concurrency_limit: usize,
    poll_interval: Duration,
    join_timeout: Duration,
    current: Mutex<Option<RunningLoop>>,
}

impl BackgroundWorker {
    pub fn new(queue: Arc<RequestQueue>, pipeline: Arc<CompletionPipeline>, config: &DispatchConfig) -> Self {
        Self {
            queue,
            pipeline,
            limiter: Arc::new(Semaphore::new(config.concurrency_limit)),
            concurrency_limit: config.concurrency_limit,
            poll_interval: config.poll_interval(),
            join_timeout: config.join_timeout(),
            current: Mutex::new(None),
        }
    }

    /// Launch the loop. Returns `false` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(RunningLoop::is_alive) {
            return false;
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let running = Arc::new(AtomicBool::new(true));
        let join = tokio::spawn(run_loop(
            self.queue.clone(),
            self.pipeline.clone(),
            self.limiter.clone(),
            self.poll_interval,
            shutdown_rx,
            running.clone(),
        ));

        *current = Some(RunningLoop {
            shutdown,
            join,
            running,
        });
        metrics::record_worker_event("started");
        info!(
            "Background worker started (concurrency limit {})",
            self.concurrency_limit
        );
        true
    }

    /// Signal the loop to exit and wait up to the join timeout for it. A loop
    /// that does not exit in time is aborted.
    pub async fn stop(&self) {
        let current = self.current.lock().take();
        let Some(RunningLoop {
            shutdown,
            mut join,
            running,
        }) = current
        else {
            return;
        };

        let _ = shutdown.send(true);
        match tokio::time::timeout(self.join_timeout, &mut join).await {
            Ok(_) => {
                metrics::record_worker_event("stopped");
                info!("Background worker stopped");
            }
            Err(_) => {
                warn!(
                    "Background worker did not stop within {:?}, aborting",
                    self.join_timeout
                );
                join.abort();
                metrics::record_worker_event("aborted");
            }
        }
        running.store(false, Ordering::SeqCst);
    }

    /// Stop, rejoin and relaunch the loop.
    pub async fn restart(&self) {
        info!("Restarting background worker");
        self.stop().await;
        self.start();
    }

    pub fn is_alive(&self) -> bool {
        self.current.lock().as_ref().is_some_and(RunningLoop::is_alive)
    }

    pub fn state(&self) -> WorkerState {
        if self.is_alive() {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Upstream calls currently in flight from worker tasks.
    pub fn in_flight(&self) -> usize {
        self.concurrency_limit
            .saturating_sub(self.limiter.available_permits())
    }
}

async fn run_loop(
    queue: Arc<RequestQueue>,
    pipeline: Arc<CompletionPipeline>,
    limiter: Arc<Semaphore>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    running: Arc<AtomicBool>,
) {
    debug!("Worker loop entered");

    loop {
        if *shutdown.borrow() {
            break;
        }

        // Wait for capacity before taking work off the queue
        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            permit = limiter.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let Some(item) = queue.pop() else {
            drop(permit);
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = queue.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        };

        tokio::spawn(process(pipeline.clone(), item, permit));
    }

    running.store(false, Ordering::SeqCst);
    info!("Worker loop exited");
}

async fn process(pipeline: Arc<CompletionPipeline>, item: QueuedRequest, _permit: OwnedSemaphorePermit) {
    let id = item.id;
    if item.is_abandoned() {
        // Still run it; the result lands in the cache
        debug!("Request {} was abandoned while queued, processing for the cache", id);
        metrics::record_worker_event("abandoned_pickup");
    } else {
        debug!("Worker picked up request {}", id);
    }
    let (request, reply) = item.into_parts();

    let outcome = AssertUnwindSafe(pipeline.run(&request, "worker"))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            error!("Worker task panicked while processing request {}", id);
            metrics::record_worker_event("task_panicked");
            Outcome::Failure("Async processing completed without result".to_string())
        });

    if reply.send(outcome).is_err() {
        // Waiter timed out; the result still landed in the cache
        debug!("Dispatcher no longer waiting for {}, dropping worker result", id);
    }
}
