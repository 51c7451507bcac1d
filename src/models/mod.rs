//! Data models for the provit backend.
//!
//! - `chat`: conversation turns, game mode and difficulty as received from the frontend.
//! - `outcome`: the success/failure value returned along the dispatch path.
//! - `upstream`: OpenAI-compatible chat completion wire types.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod chat;
pub mod outcome;
pub mod upstream;

pub use chat::{ChatMessage, ChatMode, ChatRequest, RoastIntensity, RoastLevel};
pub use outcome::Outcome;
pub use upstream::{CompletionRequest, CompletionResponse};
