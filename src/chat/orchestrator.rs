//! Multi-turn chat over a session store.
//!
//! One call per user message:
//!
//! ```text
//! lock session → append user message → send full history
//!   → append assistant reply → unlock → return reply
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::chat::session_store::SessionStore;
use crate::llms::base_llm::{ChatMessage, CompletionClient, CompletionRequest};
use crate::utilities::errors::{ChatError, LlmError};
use crate::utilities::string_utils::{is_blank, sanitize_text};

/// Seed instruction for new sessions.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, concise, and helpful responses.";

/// Session used when the caller does not name one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Token bound for a chat reply.
pub const CHAT_MAX_TOKENS: u32 = 1000;

/// Sends session histories to the completion service.
#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    client: Arc<dyn CompletionClient>,
    store: Arc<dyn SessionStore>,
    call_timeout: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn SessionStore>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            call_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Send `message` in `session_id` and return the assistant's reply.
    ///
    /// The session is held for the whole exchange, so concurrent messages on
    /// one session are applied one after another. If the call fails, the
    /// user message stays in the history and no reply is appended.
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        model: &str,
    ) -> Result<String, ChatError> {
        let message = sanitize_text(message);
        if is_blank(&message) {
            return Err(ChatError::EmptyMessage);
        }

        let _guard = self.store.lock(session_id).await;

        self.store
            .append(session_id, ChatMessage::user(message))
            .await;
        let history = self.store.get_or_create(session_id).await;
        tracing::debug!(session_id, turns = history.len(), model, "sending chat history");

        let request = CompletionRequest::new(model, history, CHAT_MAX_TOKENS);
        let reply = match tokio::time::timeout(self.call_timeout, self.client.complete(request))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(LlmError::Timeout {
                    seconds: self.call_timeout.as_secs(),
                }
                .into())
            }
        };

        let reply = sanitize_text(&reply);
        self.store
            .append(session_id, ChatMessage::assistant(reply.clone()))
            .await;
        Ok(reply)
    }

    /// Restore `session_id` to its seed system message.
    pub async fn reset(&self, session_id: &str) {
        let _guard = self.store.lock(session_id).await;
        self.store.reset(session_id).await;
        tracing::debug!(session_id, "chat session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session_store::InMemorySessionStore;
    use crate::llms::base_llm::Role;
    use crate::llms::testing::{last_user_text, ScriptedLlm};

    const MODEL: &str = "llama-3.3-70b-versatile";

    fn orchestrator(llm: Arc<ScriptedLlm>) -> ChatOrchestrator {
        let store = Arc::new(InMemorySessionStore::new(
            DEFAULT_SYSTEM_PROMPT,
            Duration::from_secs(60),
            100,
        ));
        ChatOrchestrator::new(llm, store, Duration::from_secs(5))
    }

    fn echo_llm() -> ScriptedLlm {
        ScriptedLlm::from_fn(|req| Ok(format!("echo: {}", last_user_text(req))))
    }

    #[tokio::test]
    async fn test_chat_sends_full_history() {
        let llm = Arc::new(echo_llm());
        let chat = orchestrator(llm.clone());

        assert_eq!(chat.chat("s1", "hello", MODEL).await.unwrap(), "echo: hello");
        assert_eq!(chat.chat("s1", "again", MODEL).await.unwrap(), "echo: again");

        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        let roles: Vec<Role> = calls[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(calls[1].messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(calls[1].max_tokens, CHAT_MAX_TOKENS);

        let history = chat.store().get_or_create("s1").await;
        assert_eq!(history.len(), 5);
    }

    #[tokio::test]
    async fn test_reset_starts_fresh_context() {
        let llm = Arc::new(echo_llm());
        let chat = orchestrator(llm.clone());

        chat.chat("s1", "remember this", MODEL).await.unwrap();
        chat.reset("s1").await;

        let history = chat.store().get_or_create("s1").await;
        assert_eq!(history, vec![ChatMessage::system(DEFAULT_SYSTEM_PROMPT)]);

        chat.chat("s1", "new topic", MODEL).await.unwrap();
        let last = llm.calls().pop().unwrap();
        assert_eq!(last.messages.len(), 2);
        assert_eq!(last.messages[1].content, "new topic");
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_no_reply_recorded() {
        let llm = Arc::new(ScriptedLlm::failing());
        let chat = orchestrator(llm);

        let err = chat.chat("s1", "hello", MODEL).await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(LlmError::EmptyChoices)));

        let history = chat.store().get_or_create("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let llm = Arc::new(ScriptedLlm::replying("late").with_delay(Duration::from_millis(200)));
        let store = Arc::new(InMemorySessionStore::new(
            DEFAULT_SYSTEM_PROMPT,
            Duration::from_secs(60),
            100,
        ));
        let chat = ChatOrchestrator::new(llm, store, Duration::from_millis(20));

        let err = chat.chat("s1", "hello", MODEL).await.unwrap_err();
        assert!(matches!(err, ChatError::Llm(LlmError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_blank_message_rejected_without_call() {
        let llm = Arc::new(echo_llm());
        let chat = orchestrator(llm.clone());

        let err = chat.chat("s1", " \u{0000} ", MODEL).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_messages_on_one_session_do_not_interleave() {
        let llm = Arc::new(
            ScriptedLlm::from_fn(|req| Ok(format!("re: {}", last_user_text(req))))
                .with_delay(Duration::from_millis(20)),
        );
        let chat = orchestrator(llm);

        let (a, b) = tokio::join!(chat.chat("s", "one", MODEL), chat.chat("s", "two", MODEL));
        a.unwrap();
        b.unwrap();

        let history = chat.store().get_or_create("s").await;
        assert_eq!(history.len(), 5);
        // every user turn is directly followed by its own reply
        for pair in history[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].content, format!("re: {}", pair[0].content));
        }
    }
}
