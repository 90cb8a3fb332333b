//! HTTP server for the humanizer.
//!
//! # Endpoints
//!
//! - `GET  /`           — Landing page
//! - `GET  /health`     — Liveness probe
//! - `POST /humanize`   — Humanize text through the prompt ladder
//! - `POST /chat`       — One chat turn in a session
//! - `POST /clear-chat` — Reset a chat session

pub mod routes;

pub use routes::{app_router, ApiResponse, AppState};
