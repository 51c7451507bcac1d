//! Utility functions and helpers for the provit backend.
//!
//! This module provides cross-cutting concerns like structured logging,
//! secret redaction, and the fixed-attempt retry used for upstream calls.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and log sanitization.
//! - `retry`: Fixed-budget retry with a constant delay.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
pub mod retry;
