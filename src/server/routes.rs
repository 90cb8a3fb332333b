//! Axum route handlers for the humanizer HTTP server.
//!
//! # Routes
//!
//! - `GET  /`           — HTML landing page
//! - `GET  /health`     — Returns `{"status": "ok", "version": "...", "usage": {...}}`
//! - `POST /humanize`   — Form: `prompt`, `mode`, `model`, `iterations`, `ai_response`
//! - `POST /chat`       — Form: `message`, `model`, `session_id`
//! - `POST /clear-chat` — Form: `session_id`
//!
//! The POST routes always answer HTTP 200 with one of
//! `{"success": true, "result": ...}`, `{"success": true, "message": ...}` or
//! `{"success": false, "error": ...}`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tera::Tera;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Instrument;

use crate::chat::{ChatOrchestrator, SessionStore, DEFAULT_SESSION_ID};
use crate::config::HumanizerConfig;
use crate::humanize::{
    select_source_text, HumanizeMode, IterationCount, IterativeRewriter, DEFAULT_ITERATIONS,
    LLM_APPROACH, MAX_ITERATIONS, MIN_ITERATIONS, TIERS,
};
use crate::llms::base_llm::{generate_call_id, CompletionClient};

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// Completion service shared by both pipelines.
    pub client: Arc<dyn CompletionClient>,
    pub rewriter: IterativeRewriter,
    pub chat: ChatOrchestrator,
    /// Model used when a form leaves `model` blank.
    pub default_model: String,
    templates: Arc<Tera>,
}

impl AppState {
    /// Build state from loaded configuration.
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn SessionStore>,
        config: &HumanizerConfig,
    ) -> Result<Self, tera::Error> {
        Self::from_parts(
            client,
            store,
            &config.default_model,
            config.call_timeout,
            config.max_concurrent_chunks,
        )
    }

    pub fn from_parts(
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn SessionStore>,
        default_model: &str,
        call_timeout: Duration,
        max_concurrent_chunks: usize,
    ) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template("index.html", INDEX_TEMPLATE)?;

        Ok(Self {
            rewriter: IterativeRewriter::new(client.clone(), call_timeout, max_concurrent_chunks),
            chat: ChatOrchestrator::new(client.clone(), store, call_timeout),
            client,
            default_model: default_model.to_string(),
            templates: Arc::new(tera),
        })
    }

    fn model_or_default(&self, model: Option<String>) -> String {
        model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model.clone())
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Form body of `POST /humanize`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HumanizeForm {
    pub prompt: Option<String>,
    pub mode: Option<String>,
    pub model: Option<String>,
    /// Kept as text so a malformed number falls back to the default instead
    /// of rejecting the request.
    pub iterations: Option<String>,
    pub ai_response: Option<String>,
}

/// Form body of `POST /chat`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatForm {
    pub message: Option<String>,
    pub model: Option<String>,
    pub session_id: Option<String>,
}

/// Form body of `POST /clear-chat`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClearChatForm {
    pub session_id: Option<String>,
}

/// Every POST response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    Result { success: bool, result: String },
    Message { success: bool, message: String },
    Error { success: bool, error: String },
}

impl ApiResponse {
    pub fn result(result: impl Into<String>) -> Self {
        ApiResponse::Result {
            success: true,
            result: result.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse::Message {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(error: impl ToString) -> Self {
        ApiResponse::Error {
            success: false,
            error: error.to_string(),
        }
    }
}

fn parse_iterations(raw: Option<&str>) -> IterationCount {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(IterationCount::clamped)
        .unwrap_or_default()
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/humanize", post(humanize_handler))
        .route("/chat", post(chat_handler))
        .route("/clear-chat", post(clear_chat_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET / — landing page.
async fn index_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut context = tera::Context::new();
    context.insert("mode", LLM_APPROACH);
    context.insert("default_model", &state.default_model);
    context.insert("min_iterations", &MIN_ITERATIONS);
    context.insert("max_iterations", &MAX_ITERATIONS);
    context.insert("default_iterations", &DEFAULT_ITERATIONS);
    context.insert("session_id", DEFAULT_SESSION_ID);
    context.insert("tiers", &TIERS);

    match state.templates.render("index.html", &context) {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::error!("Failed to render index page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}

/// GET /health — liveness probe with cumulative token usage.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "humanizer",
        "provider": state.client.provider(),
        "sessions": state.chat.store().len(),
        "usage": state.client.usage(),
    }))
}

/// POST /humanize — rewrite text through the prompt ladder.
///
/// The handler:
/// 1. Rejects modes other than `llm_approach`
/// 2. Picks `ai_response` if it has content, else `prompt`
/// 3. Clamps `iterations` into 1..=5 (default 2)
/// 4. Runs the rewriter; failed passes degrade silently
async fn humanize_handler(
    State(state): State<AppState>,
    form: Result<Form<HumanizeForm>, FormRejection>,
) -> Json<ApiResponse> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ApiResponse::failure(rejection.body_text())),
    };

    let request_id = generate_call_id();
    let span = tracing::info_span!("humanize", %request_id);

    let response = async move {
        let mode = form.mode.as_deref().unwrap_or_default();
        if let Err(e) = HumanizeMode::parse(mode) {
            tracing::info!("rejected humanize request: {}", e);
            return ApiResponse::failure(e);
        }

        let text = match select_source_text(form.prompt.as_deref(), form.ai_response.as_deref()) {
            Ok(text) => text,
            Err(e) => return ApiResponse::failure(e),
        };

        let iterations = parse_iterations(form.iterations.as_deref());
        let model = state.model_or_default(form.model);
        let document = state
            .rewriter
            .humanize_text(&text, iterations, &model)
            .await;

        ApiResponse::result(document.text)
    }
    .instrument(span)
    .await;

    Json(response)
}

/// POST /chat — one turn in a session.
async fn chat_handler(
    State(state): State<AppState>,
    form: Result<Form<ChatForm>, FormRejection>,
) -> Json<ApiResponse> {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return Json(ApiResponse::failure(rejection.body_text())),
    };

    let session_id = session_or_default(form.session_id);
    let model = state.model_or_default(form.model);
    let message = form.message.unwrap_or_default();
    let span = tracing::info_span!("chat", request_id = %generate_call_id(), %session_id);

    let response = match state
        .chat
        .chat(&session_id, &message, &model)
        .instrument(span)
        .await
    {
        Ok(reply) => ApiResponse::result(reply),
        Err(e) => {
            tracing::warn!(%session_id, "chat failed: {}", e);
            ApiResponse::failure(e)
        }
    };
    Json(response)
}

/// POST /clear-chat — reset a session to its seed message.
async fn clear_chat_handler(
    State(state): State<AppState>,
    form: Result<Form<ClearChatForm>, FormRejection>,
) -> Json<ApiResponse> {
    let session_id = match form {
        Ok(Form(form)) => session_or_default(form.session_id),
        Err(rejection) => return Json(ApiResponse::failure(rejection.body_text())),
    };

    state.chat.reset(&session_id).await;
    Json(ApiResponse::message("Chat history cleared"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
