//! Humanizer HTTP server binary.
//!
//! Starts an axum HTTP server exposing the humanize and chat endpoints,
//! backed by Groq's OpenAI-compatible completion API.
//!
//! # Environment Variables
//!
//! - `GROQ_API_KEY` — Completion service key (required; startup fails without it)
//! - `PORT` — HTTP port (default: 8000)
//! - `RUST_LOG` — Tracing filter (default: "info,humanizer=debug")
//!
//! See [`humanizer::config`] for the full list.
//!
//! # Usage
//!
//! ```bash
//! GROQ_API_KEY=gsk_... cargo run --bin server
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use humanizer::chat::{spawn_eviction_task, InMemorySessionStore, SessionStore, DEFAULT_SYSTEM_PROMPT};
use humanizer::server::{app_router, AppState};
use humanizer::config::RETRY_DELAY;
use humanizer::{CompletionClient, GroqCompletion, HumanizerConfig};

/// How often idle chat sessions are swept.
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,humanizer=debug".into()),
        )
        .init();

    let config = HumanizerConfig::from_env().context("Failed to load configuration")?;

    let client: Arc<dyn CompletionClient> = Arc::new(
        GroqCompletion::new(config.api_key.clone(), Some(config.base_url.clone()))
            .with_timeout(config.attempt_timeout())
            .context("Failed to build HTTP client")?
            .with_retries(config.max_retries, RETRY_DELAY),
    );

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(
        DEFAULT_SYSTEM_PROMPT,
        config.session_ttl,
        config.max_sessions,
    ));
    spawn_eviction_task(store.clone(), EVICTION_INTERVAL);

    let state = AppState::new(client, store, &config).context("Failed to load templates")?;
    let app = app_router(state);

    let bind_addr = config.bind_addr();
    tracing::info!("humanizer server starting on {}", bind_addr);
    tracing::info!("Default model: {}", config.default_model);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /           — landing page");
    tracing::info!("  GET  /health     — liveness probe");
    tracing::info!("  POST /humanize   — humanize text");
    tracing::info!("  POST /chat       — chat turn");
    tracing::info!("  POST /clear-chat — reset chat session");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    tracing::info!("humanizer server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
