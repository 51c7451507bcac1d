//! Axum-based HTTP gateway for the provit backend.
//!
//! This module validates incoming chat requests, hands them to the hybrid
//! dispatch engine through the application context, and maps the results to
//! the JSON envelope the frontend expects. It also exposes health, metrics
//! and administrative endpoints.
//!
//! # Components
//!
//! - `handlers`: Implementation of individual endpoints.
//! - `middleware`: Request ID and CORS layers.
//! - `rate_limit`: Per-IP limit on the chat endpoint.
//! - `routes`: The router that ties everything together.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod rate_limit;
mod routes;

pub use handlers::{ChatBody, ChatResponse};
pub use rate_limit::{RateLimiterLayer, RateLimiterState};
pub use routes::{create_router, AppState};
