//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat`            — Send a message, get the persona's reply
//! - `POST /v1/reload`          — Rebuild essence and index in the background
//! - `GET  /v1/status`          — Knowledge, memory and reload diagnostics
//! - `POST /v1/context/debug`   — The assembled context, without a model call
//! - `GET  /v1/weather?q=place` — Current weather for a place

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use atlas_agent::{AssemblyMetadata, ChatInput, ChatReply, ChatService, LastReload, ReloadAck};
use atlas_core::message::Role;
use atlas_tools::WeatherClient;

/// Characters of the last user/assistant entries shown by `/status`.
const SAMPLE_CHARS: usize = 160;
/// File names listed by `/status`.
const FILES_PREVIEW: usize = 15;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiState {
    pub chat: Arc<ChatService>,
    pub weather: WeatherClient,
    pub start_time: chrono::DateTime<chrono::Utc>,
    started: Instant,
}

impl ApiState {
    pub fn new(chat: Arc<ChatService>, weather: WeatherClient) -> Self {
        Self {
            chat,
            weather,
            start_time: chrono::Utc::now(),
            started: Instant::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/reload", post(reload_handler))
        .route("/status", get(status_handler))
        .route("/context/debug", post(context_debug_handler))
        .route("/weather", get(weather_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

#[derive(Serialize, Deserialize)]
struct MessageDto {
    role: String,
    content: String,
    images: usize,
}

#[derive(Serialize, Deserialize)]
struct ContextDebugResponse {
    messages: Vec<MessageDto>,
    metadata: AssemblyMetadata,
}

#[derive(Serialize, Deserialize)]
struct ServerStatus {
    pid: u32,
    started_at: String,
    uptime_secs: u64,
}

#[derive(Serialize, Deserialize)]
struct MemoryStatus {
    items: usize,
    last_user_sample: String,
    last_assistant_sample: String,
}

#[derive(Serialize, Deserialize)]
struct DocsStatus {
    dir: String,
    exists: bool,
    count: usize,
    files_preview: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct KnowledgeStatus {
    essence_chars: usize,
    chunks: usize,
    persona: String,
    persona_source: String,
}

#[derive(Serialize)]
struct ReloadStatus {
    converter_configured: bool,
    running: bool,
    last: Option<LastReload>,
}

#[derive(Serialize)]
struct StatusResponse {
    ok: bool,
    version: &'static str,
    model: String,
    provider: String,
    server: ServerStatus,
    memory: MemoryStatus,
    docs: DocsStatus,
    knowledge: KnowledgeStatus,
    reload: ReloadStatus,
}

#[derive(Deserialize)]
struct WeatherQuery {
    #[serde(default)]
    q: String,
}

#[derive(Serialize, Deserialize)]
struct WeatherResponse {
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<i64>,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatInput>,
) -> Result<Json<ChatReply>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message is required"));
    }
    info!(
        message_chars = payload.message.chars().count(),
        history = payload.history.len(),
        attachments = payload.attachments.len(),
        "v1/chat request"
    );

    state.chat.chat(payload).await.map(Json).map_err(|e| {
        error!(error = %e, "Chat failed");
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "The assistant could not answer right now. Check the API key, model and network.",
        )
    })
}

async fn reload_handler(State(state): State<SharedApiState>) -> Json<ReloadAck> {
    let ack = state.chat.knowledge().trigger_reload();
    if !ack.started {
        info!("Reload already running, request acknowledged");
    }
    Json(ack)
}

async fn status_handler(State(state): State<SharedApiState>) -> Json<StatusResponse> {
    let chat = &state.chat;
    let knowledge = chat.knowledge();
    let memory = chat.memory();

    let docs_dir = knowledge.documents_dir().to_path_buf();
    let listing = {
        let dir = docs_dir.clone();
        tokio::task::spawn_blocking(move || atlas_knowledge::list_documents(&dir))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Document listing task failed");
                None
            })
    };
    let exists = listing.is_some();
    let files = listing.unwrap_or_default();

    let sample = |turn: Option<atlas_core::Turn>| -> String {
        turn.map(|t| t.content.chars().take(SAMPLE_CHARS).collect::<String>())
            .unwrap_or_default()
    };

    let snapshot = knowledge.snapshot().await;
    let persona = chat.persona();

    Json(StatusResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        model: chat.model().to_string(),
        provider: chat.provider_name().to_string(),
        server: ServerStatus {
            pid: std::process::id(),
            started_at: state.start_time.to_rfc3339(),
            uptime_secs: state.started.elapsed().as_secs(),
        },
        memory: MemoryStatus {
            items: memory.len().await,
            last_user_sample: sample(memory.last_with_role(Role::User).await),
            last_assistant_sample: sample(memory.last_with_role(Role::Assistant).await),
        },
        docs: DocsStatus {
            dir: docs_dir.display().to_string(),
            exists,
            count: files.len(),
            files_preview: files.into_iter().take(FILES_PREVIEW).collect(),
        },
        knowledge: KnowledgeStatus {
            essence_chars: snapshot.essence.chars().count(),
            chunks: snapshot.index.len(),
            persona: persona.name.clone(),
            persona_source: persona.source.clone(),
        },
        reload: ReloadStatus {
            converter_configured: knowledge.converter_configured(),
            running: knowledge.is_reloading(),
            last: knowledge.last_reload().await,
        },
    })
}

async fn context_debug_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ChatInput>,
) -> Result<Json<ContextDebugResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message is required"));
    }

    let assembled = state.chat.build_context(&payload).await;
    Ok(Json(ContextDebugResponse {
        messages: assembled
            .messages
            .iter()
            .map(|m| MessageDto {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
                images: m.images.len(),
            })
            .collect(),
        metadata: assembled.metadata,
    }))
}

async fn weather_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<WeatherResponse>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "query parameter 'q' is required"));
    }

    let found = match state.weather.lookup(&query.q).await {
        Ok(found) => found,
        Err(e) => {
            warn!(error = %e, "Weather lookup failed");
            None
        }
    };

    Ok(Json(match found {
        Some(w) => WeatherResponse {
            summary: Some(w.summary),
            place: Some(w.place),
            code: Some(w.code),
        },
        None => WeatherResponse {
            summary: None,
            place: None,
            code: None,
        },
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────
