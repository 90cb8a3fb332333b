//! Iterative chunk rewriting and document reassembly.
//!
//! Each chunk goes through `N` sequential passes, pass `k` feeding pass
//! `k + 1`, with the prompt tier chosen by pass number. A failed or timed-out
//! pass keeps the text it was given, so a document always comes back whole
//! even when the completion service is degraded.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::segmenter::{segment, Chunk};
use super::tiers::PromptTier;
use crate::llms::base_llm::{ChatMessage, CompletionClient, CompletionRequest};
use crate::utilities::errors::LlmError;
use crate::utilities::string_utils::sanitize_text;

/// Fewest passes applied to a chunk.
pub const MIN_ITERATIONS: u8 = 1;
/// Most passes applied to a chunk.
pub const MAX_ITERATIONS: u8 = 5;
/// Passes applied when the caller does not say.
pub const DEFAULT_ITERATIONS: u8 = 2;

/// Token bound for a single rewrite pass.
pub const REWRITE_MAX_TOKENS: u32 = 2000;

/// Separator placed between rewritten chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n";

// ---------------------------------------------------------------------------
// Iteration count
// ---------------------------------------------------------------------------

/// Number of rewrite passes, always within
/// [`MIN_ITERATIONS`]..=[`MAX_ITERATIONS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IterationCount(u8);

impl IterationCount {
    /// Clamp any requested count into range.
    pub fn clamped(requested: i64) -> Self {
        let n = requested.clamp(i64::from(MIN_ITERATIONS), i64::from(MAX_ITERATIONS));
        // in range by construction
        Self(n as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for IterationCount {
    fn default() -> Self {
        Self(DEFAULT_ITERATIONS)
    }
}

// ---------------------------------------------------------------------------
// Pass outcomes
// ---------------------------------------------------------------------------

/// Result of one rewrite pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The service answered; carries the trimmed, sanitized completion.
    Rewritten(String),
    /// The pass failed; the input text is kept.
    Retained { reason: String },
}

impl PassOutcome {
    fn from_result(result: Result<String, LlmError>) -> Self {
        match result {
            Ok(text) => PassOutcome::Rewritten(sanitize_text(&text).trim().to_string()),
            Err(e) => PassOutcome::Retained {
                reason: e.to_string(),
            },
        }
    }

    /// Text to carry into the next pass.
    pub fn resolve(self, current: String) -> String {
        match self {
            PassOutcome::Rewritten(text) => text,
            PassOutcome::Retained { .. } => current,
        }
    }

    pub fn is_retained(&self) -> bool {
        matches!(self, PassOutcome::Retained { .. })
    }
}

/// A chunk after all of its passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRewrite {
    pub index: usize,
    pub text: String,
    /// Passes whose output was discarded.
    pub retained_passes: usize,
}

/// A whole humanized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HumanizedDocument {
    pub text: String,
    pub chunks: usize,
    pub passes: usize,
    pub retained_passes: usize,
}

impl HumanizedDocument {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            chunks: 0,
            passes: 0,
            retained_passes: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// IterativeRewriter
// ---------------------------------------------------------------------------

/// Drives the prompt ladder over a document.
#[derive(Debug, Clone)]
pub struct IterativeRewriter {
    client: Arc<dyn CompletionClient>,
    call_timeout: Duration,
    max_concurrent_chunks: usize,
}

impl IterativeRewriter {
    /// # Arguments
    ///
    /// * `client` - Completion service used for every pass.
    /// * `call_timeout` - Deadline for one pass, retries included.
    /// * `max_concurrent_chunks` - How many chunk chains run at once (at least 1).
    pub fn new(
        client: Arc<dyn CompletionClient>,
        call_timeout: Duration,
        max_concurrent_chunks: usize,
    ) -> Self {
        Self {
            client,
            call_timeout,
            max_concurrent_chunks: max_concurrent_chunks.max(1),
        }
    }

    /// Run a single pass over `text` at the tier for `iteration`.
    pub async fn rewrite_pass(
        &self,
        text: &str,
        iteration: u8,
        model: &str,
        chunk_index: usize,
    ) -> PassOutcome {
        let tier = PromptTier::for_iteration(iteration);
        tracing::debug!(
            chunk = chunk_index,
            iteration,
            tier = tier.level,
            tier_name = tier.name,
            chunk_chars = text.chars().count(),
            model,
            "rewrite pass"
        );

        let request = CompletionRequest::new(
            model,
            vec![
                ChatMessage::system(tier.system_prompt),
                ChatMessage::user(PromptTier::user_prompt(text)),
            ],
            REWRITE_MAX_TOKENS,
        );

        let result = match tokio::time::timeout(self.call_timeout, self.client.complete(request))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                seconds: self.call_timeout.as_secs(),
            }),
        };

        let outcome = PassOutcome::from_result(result);
        if let PassOutcome::Retained { reason } = &outcome {
            tracing::warn!(
                chunk = chunk_index,
                iteration,
                tier = tier.level,
                %reason,
                "rewrite pass failed; keeping previous text"
            );
        }
        outcome
    }

    /// Apply `iterations` sequential passes to one chunk.
    pub async fn rewrite_chunk(
        &self,
        chunk: &Chunk,
        iterations: IterationCount,
        model: &str,
    ) -> ChunkRewrite {
        let mut current = chunk.text.clone();
        let mut retained_passes = 0;

        for iteration in 1..=iterations.get() {
            let outcome = self
                .rewrite_pass(&current, iteration, model, chunk.index)
                .await;
            if outcome.is_retained() {
                retained_passes += 1;
            }
            current = outcome.resolve(current);
        }

        ChunkRewrite {
            index: chunk.index,
            text: current,
            retained_passes,
        }
    }

    /// Segment `text`, rewrite every chunk, and join the results with
    /// [`CHUNK_SEPARATOR`].
    ///
    /// Blank input, or input that segments into nothing, comes back
    /// unchanged.
    pub async fn humanize_text(
        &self,
        text: &str,
        iterations: IterationCount,
        model: &str,
    ) -> HumanizedDocument {
        let cleaned = sanitize_text(text);
        let chunks = segment(&cleaned);
        if chunks.is_empty() {
            return HumanizedDocument::unchanged(text);
        }

        tracing::info!(
            chunks = chunks.len(),
            iterations = iterations.get(),
            model,
            "humanizing document"
        );

        let rewrites: Vec<ChunkRewrite> = stream::iter(chunks)
            .map(|chunk| async move { self.rewrite_chunk(&chunk, iterations, model).await })
            .buffered(self.max_concurrent_chunks)
            .collect()
            .await;

        let retained_passes = rewrites.iter().map(|r| r.retained_passes).sum();
        let document = HumanizedDocument {
            text: rewrites
                .iter()
                .map(|r| r.text.as_str())
                .collect::<Vec<_>>()
                .join(CHUNK_SEPARATOR),
            chunks: rewrites.len(),
            passes: rewrites.len() * usize::from(iterations.get()),
            retained_passes,
        };

        tracing::info!(
            chunks = document.chunks,
            passes = document.passes,
            retained = document.retained_passes,
            "document humanized"
        );
        document
    }

    /// Single-pass humanization.
    pub async fn quick_humanize(&self, text: &str, model: &str) -> HumanizedDocument {
        self.humanize_text(text, IterationCount::clamped(1), model)
            .await
    }
}
