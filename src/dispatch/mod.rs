//! Hybrid dispatch engine.
//!
//! Requests normally go through a bounded queue to a single background
//! worker loop that runs up to `concurrency_limit` upstream calls at once.
//! The dispatcher waits on each request's reply channel for at most the
//! inner timeout and otherwise runs the same pipeline directly, so every
//! call resolves to a message.
//!
//! # Components
//!
//! - `pipeline`: cache lookup, upstream call and cache write for one request.
//! - `queue`: drop-oldest FIFO with per-request oneshot reply channels.
//! - `worker`: the queue-draining loop and its lifecycle.
//! - `dispatcher`: tier selection, inner timeout and fallback messages.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod dispatcher;
mod pipeline;
mod queue;
mod worker;

pub use dispatcher::{HybridDispatcher, CRASH_FALLBACK_MESSAGE};
pub use pipeline::CompletionPipeline;
pub use queue::{QueuedRequest, RequestQueue, CLEARED_REASON, EVICTED_REASON};
pub use worker::{BackgroundWorker, WorkerState};
