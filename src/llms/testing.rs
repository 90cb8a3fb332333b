//! In-process completion client for tests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::llms::base_llm::{CompletionClient, CompletionRequest};
use crate::utilities::errors::LlmError;

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;
type Delay = Box<dyn Fn(&CompletionRequest) -> Duration + Send + Sync>;

/// Completion client that answers from a closure and records every request.
pub(crate) struct ScriptedLlm {
    responder: Responder,
    delay: Option<Delay>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl fmt::Debug for ScriptedLlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedLlm")
            .field("calls", &self.calls.lock().len())
            .finish()
    }
}

impl ScriptedLlm {
    pub(crate) fn from_fn<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies with a fixed string.
    pub(crate) fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::from_fn(move |_| Ok(reply.clone()))
    }

    /// Fails every call.
    pub(crate) fn failing() -> Self {
        Self::from_fn(|_| Err(LlmError::EmptyChoices))
    }

    /// Sleeps before answering.
    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    /// Sleeps for a duration chosen per request before answering.
    pub(crate) fn with_delay_fn<F>(mut self, delay: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub(crate) fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Text of the last user message in a request.
pub(crate) fn last_user_text(request: &CompletionRequest) -> &str {
    request
        .messages
        .last()
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.calls.lock().push(request.clone());
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&request)).await;
        }
        (self.responder)(&request)
    }
}
