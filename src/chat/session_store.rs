//! Chat session storage.
//!
//! A session is an ordered, role-tagged message history keyed by an opaque
//! id. Sessions are created lazily, seeded with one system message, and can
//! be reset back to that seed. [`SessionStore`] is the seam the chat
//! orchestrator depends on; [`InMemorySessionStore`] is the process-memory
//! backend, bounded by an idle TTL and a session cap.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::llms::base_llm::ChatMessage;

/// Held for the duration of one read-call-write cycle on a session.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Storage for chat session histories.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Acquire exclusive use of a session, creating it if needed.
    async fn lock(&self, session_id: &str) -> SessionGuard;

    /// Full history of a session, creating it with the seed message if absent.
    async fn get_or_create(&self, session_id: &str) -> Vec<ChatMessage>;

    /// Append a message to a session, creating it if absent.
    async fn append(&self, session_id: &str, message: ChatMessage);

    /// Restore a session to just its seed message.
    async fn reset(&self, session_id: &str);

    /// Drop idle sessions. Returns how many were removed.
    async fn evict_expired(&self) -> usize;

    /// Number of live sessions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SessionEntry {
    messages: Vec<ChatMessage>,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    lock: Arc<Mutex<()>>,
}

impl SessionEntry {
    fn seeded(system_prompt: &str) -> Self {
        let now = Utc::now();
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            created_at: now,
            last_access: now,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn touch(&mut self) {
        self.last_access = Utc::now();
    }

    /// Whether someone currently holds this session's guard.
    fn in_use(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_access)
            .to_std()
            .unwrap_or_default()
    }
}

/// Process-memory session store.
///
/// Sessions idle for longer than `ttl` are evicted by
/// [`evict_expired`](SessionStore::evict_expired). When a new session would
/// exceed `max_sessions`, expired sessions are swept first and then the
/// least recently used idle session is dropped.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    system_prompt: String,
    ttl: Duration,
    max_sessions: usize,
}

impl InMemorySessionStore {
    pub fn new(system_prompt: impl Into<String>, ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            system_prompt: system_prompt.into(),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// When a session was created, if it exists.
    pub fn created_at(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions.get(session_id).map(|e| e.created_at)
    }

    fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| entry.in_use() || entry.idle_for(now) <= self.ttl);
        before - self.sessions.len()
    }

    /// Make room for one more session.
    fn enforce_capacity(&self) {
        if self.sessions.len() < self.max_sessions {
            return;
        }
        let swept = self.sweep_expired();
        if swept > 0 {
            tracing::debug!(swept, "expired sessions evicted at capacity");
        }
        while self.sessions.len() >= self.max_sessions {
            let victim = self
                .sessions
                .iter()
                .filter(|e| !e.value().in_use())
                .min_by_key(|e| e.value().last_access)
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    tracing::debug!(session_id = %key, "evicting least recently used session");
                    self.sessions.remove(&key);
                }
                // every session is busy; allow a temporary overshoot
                None => break,
            }
        }
    }

    /// Ensure `session_id` exists, then run `f` on it.
    fn with_entry<T>(&self, session_id: &str, f: impl FnOnce(&mut SessionEntry) -> T) -> T {
        if !self.sessions.contains_key(session_id) {
            self.enforce_capacity();
        }
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry::seeded(&self.system_prompt));
        entry.touch();
        f(entry.value_mut())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lock(&self, session_id: &str) -> SessionGuard {
        let lock = self.with_entry(session_id, |entry| entry.lock.clone());
        lock.lock_owned().await
    }

    async fn get_or_create(&self, session_id: &str) -> Vec<ChatMessage> {
        self.with_entry(session_id, |entry| entry.messages.clone())
    }

    async fn append(&self, session_id: &str, message: ChatMessage) {
        self.with_entry(session_id, |entry| entry.messages.push(message));
    }

    async fn reset(&self, session_id: &str) {
        let seed = ChatMessage::system(&self.system_prompt);
        self.with_entry(session_id, |entry| entry.messages = vec![seed]);
    }

    async fn evict_expired(&self) -> usize {
        self.sweep_expired()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Periodically evict expired sessions until the runtime shuts down.
pub fn spawn_eviction_task(
    store: Arc<dyn SessionStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let evicted = store.evict_expired().await;
            if evicted > 0 {
                tracing::info!(evicted, remaining = store.len(), "evicted idle chat sessions");
            }
        }
    })
}
