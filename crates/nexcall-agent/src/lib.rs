//! Conversational response generation for nexcall.
//!
//! Wraps an OpenAI-compatible chat-completions backend behind the
//! [`ResponseGenerator`] trait. The fixed persona prompt is rendered from
//! [`AgentInstructions`] and prepended to every request; call history itself
//! never contains system turns.
//!
//! `next_reply` surfaces backend failures as [`AgentError`] and leaves
//! recovery to the caller. `summarize` never fails: it degrades to a fixed
//! placeholder because summaries are not critical to the live call.

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod prompt;

pub use agent::{
    fallback_reply, ChatAgent, ResponseGenerator, APOLOGY_MESSAGE, NO_REPLY_MESSAGE,
    SUMMARY_UNAVAILABLE,
};
pub use client::{ChatClient, CompletionParams};
pub use config::{AgentInstructions, CompanyInfo, LlmConfig};
pub use error::AgentError;
