//! HTTP API gateway for Atlas.
//!
//! Exposes `/health` and the v1 API (chat, reload, status, context debug,
//! weather). Built on Axum.

pub mod api_v1;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    http::StatusCode,
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use atlas_agent::{ChatService, KnowledgeBase, KnowledgeSettings};
use atlas_config::{AppConfig, GatewayConfig};
use atlas_core::memory::ConversationLog;
use atlas_memory::FileBackend;
use atlas_tools::WeatherClient;

/// Build the full router.
///
/// Layers, outermost first:
/// - HTTP trace logging
/// - CORS
/// - In-memory rate limiting (per minute, per peer address; `/health` exempt)
/// - Token authentication when `gateway.api_token` is set
/// - Request body size limit (1 MB)
pub fn build_router(state: api_v1::SharedApiState, gateway: &GatewayConfig) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute,
        Duration::from_secs(60),
    ));
    let api_token: Arc<Option<String>> = Arc::new(
        gateway
            .api_token
            .clone()
            .filter(|t| !t.trim().is_empty()),
    );

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderName::from_static("x-api-token"),
        ])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn(move |req, next| {
            let token = api_token.clone();
            auth_middleware(token, req, next)
        }))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire the chat pipeline from configuration: provider, knowledge base,
/// long-term memory.
pub async fn build_chat_service(config: &AppConfig) -> Result<Arc<ChatService>, Box<dyn std::error::Error>> {
    let router = atlas_providers::build_from_config(config);
    let provider = router
        .default()
        .ok_or_else(|| format!("provider '{}' is not configured", config.default_provider))?;

    let settings = KnowledgeSettings::from_config(config)?;
    let knowledge = Arc::new(KnowledgeBase::open(settings).await?);

    let memory: Arc<dyn ConversationLog> = Arc::new(FileBackend::new(
        config.memory_path(),
        config.memory.persisted_cap,
    ));
    info!(
        path = %config.memory_path().display(),
        items = memory.len().await,
        "Memory loaded"
    );

    Ok(Arc::new(ChatService::from_config(
        config, provider, knowledge, memory,
    )))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if !config.has_api_key() {
        warn!("No API key configured; chat requests will fail until one is set");
    }

    let chat = build_chat_service(&config).await?;
    let state = Arc::new(api_v1::ApiState::new(chat, WeatherClient::new()));
    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        model = %config.default_model,
        auth = config.gateway.api_token.is_some(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Rate Limiter ---

/// Upper bound on tracked clients.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    max_clients: usize,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self::with_max_clients(max_requests, window, MAX_TRACKED_CLIENTS)
    }

    fn with_max_clients(max_requests: usize, window: Duration, max_clients: usize) -> Self {
        Self {
            max_requests,
            window,
            max_clients,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    ///
    /// A new client is refused while the table is full of active ones.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() >= self.max_clients && !clients.contains_key(client_key) {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
            if clients.len() >= self.max_clients {
                return false;
            }
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Returns 429 Too Many Requests once a client exceeds its budget.
///
/// Clients are keyed by the peer socket address. Request headers are never
/// consulted, so a caller cannot mint fresh buckets.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

/// The token presented by the client, from `x-api-token` or a bearer header.
fn presented_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("x-api-token")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim)
}

/// Token authentication. A no-op when no token is configured.
async fn auth_middleware(
    expected: Arc<Option<String>>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    let Some(expected) = expected.as_deref() else {
        return Ok(next.run(req).await);
    };

    match presented_token(req.headers()) {
        Some(token) if atlas_security::tokens_match(token, expected) => Ok(next.run(req).await),
        _ => {
            warn!(path = %req.uri().path(), "Unauthorized request, missing or invalid token");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    time: String,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        time: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
