//! Completion service client layer.
//!
//! - [`base_llm`] - The [`CompletionClient`] trait and the message types sent through it
//! - [`providers`] - Concrete providers (Groq's OpenAI-compatible API)

pub mod base_llm;
pub mod providers;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use base_llm::{generate_call_id, ChatMessage, CompletionClient, CompletionRequest, Role};
pub use providers::groq::GroqCompletion;
