//! Base completion client trait.
//!
//! Provides the trait every completion provider implements, together with
//! the role-tagged message type that both the rewriter and the chat
//! orchestrator send through it.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::LlmError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sampling temperature used for every call the service makes.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged message in a completion conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One request to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Model identifier, passed through to the service unchanged.
    pub model: String,
    /// Ordered conversation, system message first.
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Call context
// ---------------------------------------------------------------------------

/// Generate a unique id used to correlate log lines for one call or request.
pub fn generate_call_id() -> String {
    Uuid::new_v4().to_string()
}

/// Monotonically increasing call counter for debugging.
static CALL_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Get the next call sequence number.
pub fn next_call_sequence() -> usize {
    CALL_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// CompletionClient trait
// ---------------------------------------------------------------------------

/// A text-completion service.
///
/// Implementations take a model id, an ordered list of role-tagged messages,
/// a temperature and a max-token bound, and return the text of the first
/// completion choice. They own their own retry policy; callers layer the
/// overall deadline on top.
#[async_trait]
pub trait CompletionClient: Send + Sync + fmt::Debug {
    /// Provider name used in logs.
    fn provider(&self) -> &str;

    /// Run one completion and return its text.
    ///
    /// An empty completion is a successful result.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;

    /// Cumulative token usage since this client was created.
    fn usage(&self) -> UsageMetrics {
        UsageMetrics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let msg = ChatMessage::system("be helpful");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be helpful"}));

        let back: ChatMessage =
            serde_json::from_value(serde_json::json!({"role": "assistant", "content": "hi"}))
                .unwrap();
        assert_eq!(back, ChatMessage::assistant("hi"));
    }

    #[test]
    fn test_request_defaults_temperature() {
        let req = CompletionRequest::new("m", vec![ChatMessage::user("x")], 2000);
        assert_eq!(req.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(req.max_tokens, 2000);
    }

    #[test]
    fn test_call_ids_are_unique() {
        assert_ne!(generate_call_id(), generate_call_id());
        let a = next_call_sequence();
        let b = next_call_sequence();
        assert!(b > a);
    }
}
