// provit - hybrid async/sync dispatch backend for a slow AI chat upstream
// Author: kelexine (https://github.com/kelexine)

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod server;
pub mod upstream;
pub mod utils;
