//! Completion provider implementations.
//!
//! Each provider implements
//! [`CompletionClient`](crate::llms::base_llm::CompletionClient) and handles
//! authentication, request formatting, retries, and error mapping for its
//! service.
//!
//! | Provider | Module | Endpoint |
//! |----------|--------|----------|
//! | Groq | [`groq`] | `https://api.groq.com/openai/v1/chat/completions` |

pub mod groq;
