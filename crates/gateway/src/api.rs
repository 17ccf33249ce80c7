//! HTTP API for the conversation runtime.
//!
//! Endpoints:
//!
//! - `POST /api/chat`          : submit a turn, receive an SSE stream of events
//! - `GET  /api/threads/{id}`  : a thread's message history
//! - `GET  /api/tools`         : registered tools with their cache TTLs

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderName, StatusCode, header},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use nexus_core::error::SubmitError;
use nexus_core::message::{Message, ThreadId};
use nexus_core::thread::ThreadStore;
use nexus_tools::ToolListing;

use crate::SharedState;

/// Build the API router. Nest this under "/api" in the main router.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/threads/{id}", get(get_thread_handler))
        .route("/tools", get(list_tools_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub thread_id: String,
    pub prompt: PromptDto,
}

#[derive(Debug, Deserialize)]
pub struct PromptDto {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Serialize)]
pub struct ThreadResponse {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolListing>,
    pub count: usize,
}

fn submit_error(err: SubmitError) -> ApiError {
    let (status, code) = match &err {
        SubmitError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        SubmitError::ThreadBusy(_) => (StatusCode::CONFLICT, "thread_busy"),
        SubmitError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string())))
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

/// `POST /api/chat`: submit a turn and stream its events.
///
/// Each event is sent with its type as the SSE event name and its sequence
/// number as the SSE id. Closing the connection cancels the turn.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    info!(
        thread_id = %payload.thread_id,
        content_len = payload.prompt.content.chars().count(),
        "Chat request"
    );

    let events = state
        .runtime
        .submit_turn(ThreadId::new(payload.thread_id), payload.prompt.content)
        .await
        .map_err(submit_error)?;

    let stream = events.map(|event| {
        let (name, data) = event.encode();
        Ok::<_, Infallible>(
            SseEvent::default()
                .event(name)
                .id(event.seq.to_string())
                .data(data),
        )
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
        .into_response())
}

// ── Threads & tools ───────────────────────────────────────────────────────

async fn get_thread_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread_id = ThreadId::new(id);
    let messages = state
        .runtime
        .store()
        .snapshot(&thread_id)
        .await
        .map_err(|e| {
            error!(thread_id = %thread_id, error = %e, "Thread snapshot failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("internal", e.to_string())),
            )
        })?;

    if messages.is_empty() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                format!("thread {thread_id} has no messages"),
            )),
        ));
    }

    Ok(Json(ThreadResponse {
        thread_id,
        messages,
    }))
}

async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools = state.runtime.dispatcher().listings();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}
