//! Error types for the humanizer service.
//!
//! Each layer owns one enum: the completion client reports [`LlmError`],
//! configuration loading reports [`ConfigError`], and the two request paths
//! report [`HumanizeError`] and [`ChatError`]. Route handlers render all of
//! them into the `{success: false, error}` response shape.

use thiserror::Error;

/// Errors from a call to the external completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was configured for the provider.
    #[error("API key not set for provider '{provider}'")]
    MissingApiKey { provider: String },

    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Completion API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("Failed to parse completion response: {message}")]
    Parse { message: String },

    /// The response carried no choices.
    #[error("No choices in completion response")]
    EmptyChoices,

    /// The call did not finish within the configured deadline.
    #[error("Completion call timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl LlmError {
    /// Whether a retry can reasonably succeed.
    ///
    /// Transport errors, rate limiting and 5xx responses are retryable;
    /// everything else is a property of the request itself.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Timeout { .. } => true,
            LlmError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The completion service credential is absent.
    #[error("GROQ_API_KEY must be set in the environment")]
    MissingApiKey,

    /// A variable is present but cannot be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

/// Validation failures on the humanize path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HumanizeError {
    /// Both the prompt and the AI response were blank.
    #[error("No text available to humanize. Provide text or generate an AI response first.")]
    NoText,

    /// The requested mode has no implementation.
    #[error("Mode '{mode}' is not implemented yet")]
    ModeNotImplemented { mode: String },
}

/// Failures on the chat path.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The user message was blank after sanitizing.
    #[error("Message must not be empty")]
    EmptyMessage,

    /// The completion service call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}
