//! Groq native completion provider.
//!
//! Groq serves an OpenAI-compatible Chat Completions API at
//! `https://api.groq.com/openai/v1`, so this provider speaks the standard
//! request/response format over `reqwest`.
//!
//! # Features
//!
//! - Chat Completions API via `reqwest`
//! - Per-attempt timeout on the HTTP client
//! - Bounded retry with exponential backoff on transport errors, 429 and 5xx
//! - Token usage tracking
//!
//! # Environment Variables
//!
//! - `GROQ_API_KEY` — Groq API key (required)
//! - `GROQ_BASE_URL` — Custom base URL (defaults to `https://api.groq.com/openai/v1`)

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::llms::base_llm::{next_call_sequence, CompletionClient, CompletionRequest};
use crate::types::usage_metrics::UsageMetrics;
use crate::utilities::errors::LlmError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default Groq API base URL.
pub const GROQ_DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Longest slice of an unparsable body quoted back in an error.
const ERROR_BODY_PREVIEW: usize = 500;

// ---------------------------------------------------------------------------
// GroqCompletion provider
// ---------------------------------------------------------------------------

/// Groq completion implementation.
///
/// # Example
///
/// ```ignore
/// let provider = GroqCompletion::new(api_key, None);
/// let request = CompletionRequest::new("llama-3.3-70b-versatile", messages, 2000);
/// let text = provider.complete(request).await?;
/// ```
#[derive(Debug)]
pub struct GroqCompletion {
    api_key: String,
    base_url: String,
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
    attempt_timeout: Option<Duration>,
    client: reqwest::Client,
    usage: Mutex<UsageMetrics>,
}

impl GroqCompletion {
    /// Create a new Groq completion provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Groq API key.
    /// * `base_url` - Optional custom base URL (defaults to [`GROQ_DEFAULT_BASE_URL`]).
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.unwrap_or_else(|| GROQ_DEFAULT_BASE_URL.to_string()),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
            attempt_timeout: None,
            client: reqwest::Client::new(),
            usage: Mutex::new(UsageMetrics::default()),
        }
    }

    /// Bound each HTTP attempt by `timeout`.
    ///
    /// An attempt that runs out of time fails with [`LlmError::Timeout`]
    /// and is retried like any other transport failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        self.attempt_timeout = Some(timeout);
        Ok(self)
    }

    /// Set the retry policy.
    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Get the API base URL.
    pub fn api_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Build the request body for the Chat Completions API.
    pub fn build_request_body(&self, request: &CompletionRequest) -> Value {
        serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    /// Parse a Chat Completions API response.
    ///
    /// A `null` or missing `content` on the first choice is an empty
    /// completion, not an error.
    fn parse_response(&self, response: &Value) -> Result<String, LlmError> {
        let choice = response
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or(LlmError::EmptyChoices)?;

        let message = choice.get("message").ok_or_else(|| LlmError::Parse {
            message: "No message in Groq choice".to_string(),
        })?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("");

        if let Some(usage) = response.get("usage") {
            let metrics = UsageMetrics::from_usage_block(usage);
            log::debug!(
                "Groq token usage: prompt={}, completion={}, total={}",
                metrics.prompt_tokens,
                metrics.completion_tokens,
                metrics.total_tokens,
            );
            self.usage.lock().add_usage_metrics(&metrics);
        } else {
            self.usage.lock().successful_requests += 1;
        }

        Ok(content.to_string())
    }

    fn transport_error(&self, error: reqwest::Error) -> LlmError {
        match self.attempt_timeout {
            Some(timeout) if error.is_timeout() => LlmError::Timeout {
                seconds: timeout.as_secs(),
            },
            _ => LlmError::Http(error),
        }
    }

    /// One HTTP round trip, without retries.
    async fn attempt(&self, endpoint: &str, body: &Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let response_json: Value =
            serde_json::from_str(&response_text).map_err(|e| LlmError::Parse {
                message: format!(
                    "{} - Body: {}",
                    e,
                    response_text
                        .chars()
                        .take(ERROR_BODY_PREVIEW)
                        .collect::<String>()
                ),
            })?;

        self.parse_response(&response_json)
    }
}

#[async_trait]
impl CompletionClient for GroqCompletion {
    fn provider(&self) -> &str {
        "groq"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: "groq".to_string(),
            });
        }

        let sequence = next_call_sequence();
        log::debug!(
            "GroqCompletion.complete #{}: model={}, messages={}, max_tokens={}",
            sequence,
            request.model,
            request.messages.len(),
            request.max_tokens,
        );

        let body = self.build_request_body(&request);
        let endpoint = format!("{}/chat/completions", self.api_base_url());

        // Retry loop with exponential backoff
        let mut retry_delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.attempt(&endpoint, &body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    log::warn!(
                        "Groq call #{} failed ({}); retry attempt {} after {:?}",
                        sequence,
                        e,
                        attempt,
                        retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn usage(&self) -> UsageMetrics {
        self.usage.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

    use crate::humanize::IterativeRewriter;
    use crate::llms::base_llm::ChatMessage;

    /// Serve `router` on an ephemeral local port and return its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(
            "llama-3.3-70b-versatile",
            vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
            1000,
        )
    }

    #[test]
    fn test_build_request_body() {
        let provider = GroqCompletion::new("key", None);
        let body = provider.build_request_body(&request());
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_parse_null_content_is_empty_completion() {
        let provider = GroqCompletion::new("key", None);
        let text = provider
            .parse_response(&serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            }))
            .unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_parse_no_choices() {
        let provider = GroqCompletion::new("key", None);
        let err = provider
            .parse_response(&serde_json::json!({"choices": []}))
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyChoices));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let provider = GroqCompletion::new("", Some("http://127.0.0.1:9".into()));
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey { .. }));
    }

    #[tokio::test]
    async fn test_complete_against_local_upstream() {
        let router = Router::new().route(
            "/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let echoed = body["messages"][1]["content"].as_str().unwrap_or("").to_uppercase();
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": echoed}}],
                    "usage": {"prompt_tokens": 7, "completion_tokens": 2, "total_tokens": 9}
                }))
            }),
        );
        let base = spawn_upstream(router).await;

        let provider = GroqCompletion::new("key", Some(base));
        let text = provider.complete(request()).await.unwrap();
        assert_eq!(text, "HELLO");

        let usage = provider.usage();
        assert_eq!(usage.total_tokens, 9);
        assert_eq!(usage.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_retries_once_on_server_error() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/chat/completions",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err((StatusCode::SERVICE_UNAVAILABLE, "busy"));
                    }
                    Ok(Json(serde_json::json!({
                        "choices": [{"message": {"content": "second time lucky"}}]
                    })))
                }),
            )
            .with_state(hits.clone());
        let base = spawn_upstream(router).await;

        let provider = GroqCompletion::new("key", Some(base))
            .with_retries(1, Duration::from_millis(5));
        let text = provider.complete(request()).await.unwrap();
        assert_eq!(text, "second time lucky");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    /// Upstream whose first answer takes `first_delay`; later ones are instant.
    async fn slow_first_upstream(hits: Arc<AtomicUsize>, first_delay: Duration) -> String {
        let router = Router::new()
            .route(
                "/chat/completions",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(first_delay).await;
                    }
                    Json(serde_json::json!({
                        "choices": [{"message": {"content": "rewritten."}}]
                    }))
                }),
            )
            .with_state(hits);
        spawn_upstream(router).await
    }

    #[tokio::test]
    async fn test_timed_out_attempt_is_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = slow_first_upstream(hits.clone(), Duration::from_millis(500)).await;

        let provider = GroqCompletion::new("key", Some(base))
            .with_timeout(Duration::from_millis(200))
            .unwrap()
            .with_retries(1, Duration::from_millis(5));
        let text = provider.complete(request()).await.unwrap();
        assert_eq!(text, "rewritten.");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_timeout_reported_when_retries_exhausted() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = slow_first_upstream(hits.clone(), Duration::from_millis(500)).await;

        let provider = GroqCompletion::new("key", Some(base))
            .with_timeout(Duration::from_millis(100))
            .unwrap()
            .with_retries(0, Duration::from_millis(5));
        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
        assert!(err.is_retryable());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rewrite_survives_one_slow_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = slow_first_upstream(hits.clone(), Duration::from_millis(500)).await;

        let provider = GroqCompletion::new("key", Some(base))
            .with_timeout(Duration::from_millis(200))
            .unwrap()
            .with_retries(1, Duration::from_millis(5));
        let rewriter = IterativeRewriter::new(Arc::new(provider), Duration::from_millis(1_000), 1);

        let doc = rewriter.quick_humanize("orig.", "llama-3.3-70b-versatile").await;
        assert_eq!(doc.text, "rewritten.");
        assert_eq!(doc.retained_passes, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/chat/completions",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::UNAUTHORIZED, "invalid key")
                }),
            )
            .with_state(hits.clone());
        let base = spawn_upstream(router).await;

        let provider = GroqCompletion::new("key", Some(base))
            .with_retries(3, Duration::from_millis(5));
        let err = provider.complete(request()).await.unwrap_err();
        match err {
            LlmError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid key");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
