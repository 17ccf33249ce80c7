//! Events emitted to the caller while a turn runs.
//!
//! A response is an ordered sequence of [`SequencedEvent`]s:
//! - `token`: partial answer text
//! - `tool_call_issued`: the loop is invoking a tool
//! - `tool_result`: a tool call finished (or failed)
//! - `done`: the turn completed (terminal)
//! - `error`: the turn failed or was cancelled (terminal)

use nexus_core::message::{ThreadId, ToolOutput};
use serde::{Deserialize, Serialize};

/// Machine-readable cause of a terminal `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The reasoning provider failed
    Provider,
    /// The caller cancelled or went away
    Cancelled,
    /// Thread store or encoding failure
    Internal,
}

/// Why a turn reached `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model produced a final answer
    Completed,
    /// The step budget ran out and the loop finalized on its own
    StepBudgetExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Token {
        text: String,
    },

    ToolCallIssued {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolResult {
        call_id: String,
        tool_name: String,
        output: ToolOutput,
        served_from_cache: bool,
        latency_ms: u64,
    },

    Error {
        code: ErrorCode,
        message: String,
    },

    Done {
        thread_id: ThreadId,
        /// Reasoning calls made during the turn
        steps: u32,
        /// Tool calls dispatched during the turn
        tool_calls: usize,
        finish_reason: FinishReason,
    },
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::ToolCallIssued { .. } => "tool_call_issued",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// `done` and `error` end a response.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

/// An event stamped with its position in the response (from 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent {
    pub seq: u64,
    #[serde(flatten)]
    pub event: StreamEvent,
}

impl SequencedEvent {
    /// Event name and JSON payload for the wire.
    ///
    /// Never yields a malformed payload: if serialization fails, a terminal
    /// `error` event with the same `seq` is encoded instead.
    pub fn encode(&self) -> (&'static str, String) {
        match serde_json::to_string(self) {
            Ok(json) => (self.event.event_type(), json),
            Err(e) => {
                let fallback = serde_json::json!({
                    "seq": self.seq,
                    "type": "error",
                    "code": ErrorCode::Internal,
                    "message": format!("failed to encode event: {e}"),
                });
                ("error", fallback.to_string())
            }
        }
    }
}
