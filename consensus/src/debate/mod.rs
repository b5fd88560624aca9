//! Debate orchestration: prompts, the completion-service seam, and the runner.

pub mod prompts;
pub mod runner;
pub mod service;

pub use runner::{CriticMode, DebateConfig, DebateError, DebateRunner, RunSummary};
pub use service::{CompletionError, CompletionService, EndpointConfig, OpenAiClient};
