// Shared test fixtures: a scripted completion backend and config helpers
// Author: kelexine (https://github.com/kelexine)

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use provit::config::AppConfig;
use provit::context::AppContext;
use provit::error::{Result, ServiceError};
use provit::models::{ChatMessage, ChatMode, ChatRequest, CompletionRequest, CompletionResponse, RoastLevel};
use provit::upstream::CompletionBackend;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a scripted call does once its delay has elapsed.
#[derive(Debug, Clone)]
pub enum Action {
    Reply(String),
    Empty,
    Fail(String),
    Panic,
}

#[derive(Debug, Clone)]
pub struct Step {
    pub delay: Duration,
    pub action: Action,
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Self { delay: Duration::ZERO, action: Action::Reply(text.to_string()) }
    }

    pub fn empty() -> Self {
        Self { delay: Duration::ZERO, action: Action::Empty }
    }

    pub fn fail(reason: &str) -> Self {
        Self { delay: Duration::ZERO, action: Action::Fail(reason.to_string()) }
    }

    pub fn panic() -> Self {
        Self { delay: Duration::ZERO, action: Action::Panic }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Backend that plays back a script, then repeats `fallback` forever.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(step: Step) -> Arc<Self> {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently inside `create_completion`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest `in_flight` value seen so far.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step.action {
            Action::Reply(text) => Ok(CompletionResponse::with_content(text)),
            Action::Empty => Ok(CompletionResponse::default()),
            Action::Fail(reason) => Err(ServiceError::Upstream(reason)),
            Action::Panic => panic!("scripted backend panic"),
        }
    }
}

/// Defaults from the config module, with a few knobs tests usually turn.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.upstream.retry_attempts = 2;
    config.upstream.retry_delay_secs = 2;
    config.dispatch.async_timeout_secs = 60;
    config.server.sync_timeout_secs = 75;
    config
}

pub fn context_with(config: AppConfig, backend: Arc<ScriptedBackend>) -> Arc<AppContext> {
    Arc::new(AppContext::new(config, backend))
}

pub fn chat_request(text: &str) -> ChatRequest {
    ChatRequest::new(vec![ChatMessage::user(text)], ChatMode::ConvinceAi, RoastLevel::default())
}

/// Let spawned tasks run until `cond` holds (the clock is usually paused).
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
