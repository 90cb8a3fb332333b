//! Token usage accounting for completion calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cumulative usage reported by the completion service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    /// Total number of tokens used.
    pub total_tokens: i64,
    /// Number of tokens used in prompts.
    pub prompt_tokens: i64,
    /// Number of tokens used in completions.
    pub completion_tokens: i64,
    /// Number of successful requests made.
    pub successful_requests: i64,
}

impl UsageMetrics {
    /// Create a new empty UsageMetrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add usage metrics from another UsageMetrics object.
    pub fn add_usage_metrics(&mut self, other: &UsageMetrics) {
        self.total_tokens += other.total_tokens;
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.successful_requests += other.successful_requests;
    }

    /// Build metrics for one successful request from an OpenAI-style
    /// `usage` object. Missing fields count as zero.
    pub fn from_usage_block(usage: &Value) -> Self {
        let field = |name: &str| usage.get(name).and_then(Value::as_i64).unwrap_or(0);
        Self {
            total_tokens: field("total_tokens"),
            prompt_tokens: field("prompt_tokens"),
            completion_tokens: field("completion_tokens"),
            successful_requests: 1,
        }
    }
}
