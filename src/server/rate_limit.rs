//! Per-IP rate limiting for the chat endpoint.
//!
//! Fixed one-minute windows per client address: the first request from an
//! IP opens a window, and once `requests_per_minute` requests have been
//! admitted in it, the rest are answered with 429 until the window ends.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::ServiceError;
use axum::extract::{ConnectInfo, Request};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);

/// Expired windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    admitted: u32,
}

/// Shared per-IP window table.
#[derive(Debug)]
pub struct RateLimiterState {
    windows: Mutex<HashMap<IpAddr, Window>>,
    requests_per_minute: u32,
}

impl RateLimiterState {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            requests_per_minute,
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Count one request from `ip`. Returns `false` when it is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        if windows.len() > SWEEP_THRESHOLD {
            windows.retain(|_, window| now.duration_since(window.started_at) < WINDOW);
        }

        let window = windows.entry(ip).or_insert(Window {
            started_at: now,
            admitted: 0,
        });
        if now.duration_since(window.started_at) >= WINDOW {
            *window = Window {
                started_at: now,
                admitted: 0,
            };
        }

        if window.admitted < self.requests_per_minute {
            window.admitted += 1;
            true
        } else {
            false
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Layer that applies [`RateLimiterState`] to the wrapped service.
#[derive(Clone, Debug)]
pub struct RateLimiterLayer {
    state: Option<Arc<RateLimiterState>>,
}

impl RateLimiterLayer {
    /// A limit of `0` lets every request through.
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            state: (requests_per_minute > 0).then(|| Arc::new(RateLimiterState::new(requests_per_minute))),
        }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter<S> {
    inner: S,
    state: Option<Arc<RateLimiterState>>,
}

impl<S> Service<Request> for RateLimiter<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Keep the instance that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let Some(state) = self.state.clone() else {
            return Box::pin(async move { inner.call(req).await });
        };

        let client_ip = client_ip(&req);
        if state.check(client_ip) {
            Box::pin(async move { inner.call(req).await })
        } else {
            warn!("Rate limit exceeded for {} on {}", client_ip, req.uri().path());
            let limit = state.requests_per_minute();
            Box::pin(async move { Ok(ServiceError::RateLimited(limit).into_response()) })
        }
    }
}

/// First `x-forwarded-for` hop, then the peer address, then loopback.
fn client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/limited")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_a_minute() {
        let state = RateLimiterState::new(2);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        assert!(state.check(ip));
        assert!(state.check(ip));
        assert!(!state.check(ip));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(!state.check(ip));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(state.check(ip));
    }

    #[test]
    fn test_limits_are_per_ip() {
        let state = RateLimiterState::new(1);
        assert!(state.check("10.0.0.1".parse().unwrap()));
        assert!(!state.check("10.0.0.1".parse().unwrap()));
        assert!(state.check("10.0.0.2".parse().unwrap()));
        assert_eq!(state.tracked_clients(), 2);
    }

    #[tokio::test]
    async fn test_zero_limit_disables_layer() {
        let app = Router::new()
            .route("/limited", get(|| async { "ok" }))
            .layer(RateLimiterLayer::new(0));

        for _ in 0..5 {
            let response = app.clone().oneshot(request_from("10.0.0.9")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_excess_request_gets_429() {
        let app = Router::new()
            .route("/limited", get(|| async { "ok" }))
            .layer(RateLimiterLayer::new(1));

        let first = app.clone().oneshot(request_from("10.0.0.3")).await.unwrap();
        let second = app.clone().oneshot(request_from("10.0.0.3")).await.unwrap();

        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_client_ip_falls_back_to_peer_address() {
        let mut req = Request::builder().uri("/").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 5555))));
        assert_eq!(client_ip(&req), "192.168.1.7".parse::<IpAddr>().unwrap());

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
