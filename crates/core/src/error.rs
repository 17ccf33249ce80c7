//! Error types for the Nexus domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; only some of them are
//! allowed to reach the caller of a turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for Nexus operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Thread store errors ---
    #[error("Thread store error: {0}")]
    Store(#[from] StoreError),

    // --- Cache errors ---
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the reasoning provider. Not recoverable inside a turn.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider output: {0}")]
    Malformed(String),
}

/// Why a tool call did not produce a value.
///
/// Both variants are data, not control flow: the agent loop hands them back
/// to the reasoning engine so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ToolFailure {
    #[error("Invalid tool arguments: {0}")]
    Argument(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),
}

/// Failures of a cache store backend. Never surfaced past the cache-aside layer.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Failures of a thread store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Thread store unavailable: {0}")]
    Unavailable(String),

    #[error("Thread store rejected write to {thread_id}: {reason}")]
    WriteRejected { thread_id: String, reason: String },
}

/// Reasons a turn submission is refused before any stream is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Thread {0} is busy with another turn")]
    ThreadBusy(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to record user message: {0}")]
    Store(String),
}
