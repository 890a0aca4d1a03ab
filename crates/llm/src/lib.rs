//! Decision source clients for Switchyard.
//!
//! The router only needs [`LlmClient::complete`]; everything else in this
//! crate is plumbing around it: an OpenAI-compatible HTTP client (DeepSeek,
//! Ollama, OpenAI), a retry wrapper for transient failures, a concurrency
//! limiter shared by independent tasks, and a scripted client that replays
//! canned responses for deterministic runs.

pub mod client;
pub mod config;
pub mod openai;
pub mod retry;
pub mod scripted;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage};
pub use config::{LlmConfig, SemaphoredClient, build_llm_client};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
pub use scripted::ScriptedClient;
