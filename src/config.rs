//! Service configuration.
//!
//! Everything is read from process environment variables. `GROQ_API_KEY` is
//! mandatory; every other setting has a default.
//!
//! # Environment Variables
//!
//! - `GROQ_API_KEY` — completion service credential (required)
//! - `GROQ_BASE_URL` — completion API base (default: `https://api.groq.com/openai/v1`)
//! - `PORT` — HTTP port (default: 8000)
//! - `HUMANIZER_MODEL` — default model (default: `llama-3.3-70b-versatile`)
//! - `HUMANIZER_CALL_TIMEOUT_SECS` — deadline for one completion call (default: 60)
//! - `HUMANIZER_MAX_RETRIES` — retries after a failed attempt (default: 1)
//! - `HUMANIZER_MAX_CONCURRENT_CHUNKS` — chunks rewritten at once (default: 4)
//! - `HUMANIZER_SESSION_TTL_SECS` — idle lifetime of a chat session (default: 3600)
//! - `HUMANIZER_MAX_SESSIONS` — chat session cap (default: 10000)

use std::str::FromStr;
use std::time::Duration;

use crate::llms::providers::groq::GROQ_DEFAULT_BASE_URL;
use crate::utilities::errors::ConfigError;

/// Model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Delay before the first retry of a completion call; doubles per retry.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Runtime configuration for the server.
#[derive(Debug, Clone)]
pub struct HumanizerConfig {
    pub api_key: String,
    pub base_url: String,
    pub port: u16,
    pub default_model: String,
    pub call_timeout: Duration,
    pub max_retries: u32,
    pub max_concurrent_chunks: usize,
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl HumanizerConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GROQ_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            api_key,
            base_url: lookup("GROQ_BASE_URL").unwrap_or_else(|| GROQ_DEFAULT_BASE_URL.into()),
            port: parse_or(&lookup, "PORT", 8000)?,
            default_model: lookup("HUMANIZER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            call_timeout: Duration::from_secs(parse_or(&lookup, "HUMANIZER_CALL_TIMEOUT_SECS", 60)?),
            max_retries: parse_or(&lookup, "HUMANIZER_MAX_RETRIES", 1)?,
            max_concurrent_chunks: parse_or(&lookup, "HUMANIZER_MAX_CONCURRENT_CHUNKS", 4)?,
            session_ttl: Duration::from_secs(parse_or(&lookup, "HUMANIZER_SESSION_TTL_SECS", 3600)?),
            max_sessions: parse_or(&lookup, "HUMANIZER_MAX_SESSIONS", 10_000)?,
        })
    }

    /// Deadline for a single HTTP attempt.
    ///
    /// `call_timeout` bounds the whole call, so every attempt plus the
    /// backoff between them has to fit inside it.
    pub fn attempt_timeout(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        let mut backoff = Duration::ZERO;
        let mut delay = RETRY_DELAY;
        for _ in 0..self.max_retries {
            backoff = backoff.saturating_add(delay);
            delay = delay.saturating_mul(2);
        }
        let share = self.call_timeout.saturating_sub(backoff) / attempts;
        if share.is_zero() {
            self.call_timeout / attempts
        } else {
            share
        }
    }

    /// Address the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
    }
}
