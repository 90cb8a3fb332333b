//! Humanization pipeline.
//!
//! ```text
//! raw text
//!   → segmenter (ordered, non-blank chunks)
//!   → rewriter  (N passes per chunk: naturalness → personality → polish)
//!   → join with blank lines
//! ```

pub mod rewriter;
pub mod segmenter;
pub mod tiers;

pub use rewriter::{
    HumanizedDocument, IterationCount, IterativeRewriter, PassOutcome, DEFAULT_ITERATIONS,
    MAX_ITERATIONS, MIN_ITERATIONS,
};
pub use segmenter::{segment, Chunk};
pub use tiers::{PromptTier, TIERS};

use crate::utilities::errors::HumanizeError;
use crate::utilities::string_utils::{is_blank, sanitize_text};

/// Wire name of the LLM rewrite mode.
pub const LLM_APPROACH: &str = "llm_approach";

/// How a humanize request should be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HumanizeMode {
    /// Iterative rewriting through the completion service.
    LlmApproach,
}

impl HumanizeMode {
    pub fn parse(mode: &str) -> Result<Self, HumanizeError> {
        match mode.trim() {
            LLM_APPROACH => Ok(HumanizeMode::LlmApproach),
            other => Err(HumanizeError::ModeNotImplemented {
                mode: other.to_string(),
            }),
        }
    }
}

/// Pick the text to humanize: the AI response when it has content,
/// otherwise the prompt. Both are sanitized first.
pub fn select_source_text(
    prompt: Option<&str>,
    ai_response: Option<&str>,
) -> Result<String, HumanizeError> {
    [ai_response, prompt]
        .into_iter()
        .flatten()
        .map(sanitize_text)
        .find(|text| !is_blank(text))
        .ok_or(HumanizeError::NoText)
}
