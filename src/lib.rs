//! # Humanizer
//!
//! Rewrites AI-generated text so it reads as if a person wrote it, and hosts
//! a simple multi-turn chat, both backed by an external LLM completion API.
//!
//! The humanize path segments a document into paragraph chunks, runs each
//! chunk through up to five rewrite passes over a three-tier prompt ladder
//! (naturalness, personality, polish), and joins the results. A failed pass
//! keeps the text it was given, so partial outages degrade quality rather
//! than availability.

pub mod chat;
pub mod config;
pub mod humanize;
pub mod llms;
pub mod server;
pub mod types;
pub mod utilities;

pub use chat::{ChatOrchestrator, InMemorySessionStore, SessionStore};
pub use config::HumanizerConfig;
pub use humanize::{segment, Chunk, HumanizedDocument, IterationCount, IterativeRewriter};
pub use llms::{CompletionClient, GroqCompletion};
pub use utilities::errors::{ChatError, ConfigError, HumanizeError, LlmError};

/// Crate version reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
