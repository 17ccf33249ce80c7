//! HTTP gateway for Nexus.
//!
//! Exposes the conversation runtime over HTTP: a streaming chat endpoint
//! (Server-Sent Events), thread history, tool listings and a health check.
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use nexus_agent::ConversationRuntime;
use nexus_config::{AppConfig, GatewayConfig};
use nexus_core::thread::ThreadStore;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Arc<ConversationRuntime>,
}

pub type SharedState = Arc<GatewayState>;

/// Request bodies larger than this are rejected.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Wire a runtime from configuration: provider, cache, tools and thread store.
pub async fn build_runtime(
    config: &AppConfig,
) -> Result<ConversationRuntime, Box<dyn std::error::Error + Send + Sync>> {
    let provider = nexus_providers::build_from_config(config)?;
    let cache = nexus_cache::build_from_config(&config.cache).await?;
    let dispatcher = Arc::new(
        nexus_tools::default_dispatcher(&config.tools, cache)
            .with_cache_timeout(Duration::from_millis(config.cache.timeout_ms)),
    );
    let store: Arc<dyn ThreadStore> = Arc::new(nexus_sessions::build_from_config(&config.sessions));

    info!(
        model = %config.model,
        tools = dispatcher.len(),
        max_steps = config.agent.max_steps,
        "Conversation runtime ready"
    );
    Ok(ConversationRuntime::from_config(config, provider, dispatcher, store))
}

/// Build the router with all gateway routes.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - `nosniff` and `DENY` framing headers on every response
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router(state))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let runtime = build_runtime(&config).await?;
    let state = Arc::new(GatewayState {
        runtime: Arc::new(runtime),
    });
    let app = build_router(state, &config.gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
