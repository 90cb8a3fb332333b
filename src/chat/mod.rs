//! Chat module: session-backed conversation with the completion service.
//!
//! ```text
//! POST /chat
//!   → lock session (created lazily with the seed system message)
//!   → append user message
//!   → send whole history to the completion service
//!   → append assistant reply
//!   → return reply
//! ```

pub mod orchestrator;
pub mod session_store;

pub use orchestrator::{ChatOrchestrator, DEFAULT_SESSION_ID, DEFAULT_SYSTEM_PROMPT};
pub use session_store::{spawn_eviction_task, InMemorySessionStore, SessionGuard, SessionStore};
