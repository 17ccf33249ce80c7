//! Message and thread identity types.
//!
//! These are the value objects that flow through the runtime:
//! caller turn → thread store → agent loop → provider / tools → thread store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ToolFailure;

/// Opaque key of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message in a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The assistant's final answer for a turn
    Assistant,
    /// Result of a tool invocation
    Tool,
}

/// Outcome of a tool call as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutput {
    Ok { value: serde_json::Value },
    Error { error: ToolFailure },
}

impl ToolOutput {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// Text handed back to the reasoning engine for this outcome.
    pub fn render(&self) -> String {
        match self {
            Self::Ok { value: serde_json::Value::String(s) } => s.clone(),
            Self::Ok { value } => value.to_string(),
            Self::Error { error } => format!("Error: {error}"),
        }
    }
}

impl From<Result<serde_json::Value, ToolFailure>> for ToolOutput {
    fn from(result: Result<serde_json::Value, ToolFailure>) -> Self {
        match result {
            Ok(value) => Self::Ok { value },
            Err(error) => Self::Error { error },
        }
    }
}

/// Structured payload of a tool message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    /// The call this result answers
    pub call_id: String,

    /// Tool that was invoked
    pub tool_name: String,

    /// Canonical arguments (or the raw ones, if they failed validation)
    pub arguments: serde_json::Value,

    /// Value or failure
    pub output: ToolOutput,

    /// Whether the value came from the cache instead of a live call
    #[serde(default)]
    pub served_from_cache: bool,
}

/// Message body: plain text or a tool result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    ToolResult(ToolResultPayload),
}

impl MessageContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::ToolResult(_) => None,
        }
    }

    pub fn tool_result(&self) -> Option<&ToolResultPayload> {
        match self {
            Self::ToolResult(payload) => Some(payload),
            Self::Text { .. } => None,
        }
    }
}

/// A message that has not been appended yet.
///
/// The thread store turns it into a [`Message`] by stamping the sequence
/// number and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl NewMessage {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// A final assistant answer.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// A tool result.
    pub fn tool(payload: ToolResultPayload) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult(payload),
        }
    }
}

/// A message as stored in a thread. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Position in the thread, starting at 1, gapless
    pub seq: u64,

    pub role: Role,

    pub content: MessageContent,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Stamp a pending message.
    pub fn stamped(seq: u64, message: NewMessage) -> Self {
        Self {
            seq,
            role: message.role,
            content: message.content,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = NewMessage::user("price of X");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content.text(), Some("price of X"));
    }

    #[test]
    fn stamped_message_keeps_content() {
        let msg = Message::stamped(3, NewMessage::assistant("X is 42"));
        assert_eq!(msg.seq, 3);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.text(), Some("X is 42"));
    }

    #[test]
    fn tool_output_renders_for_reasoning() {
        let ok = ToolOutput::Ok {
            value: serde_json::json!(42),
        };
        assert_eq!(ok.render(), "42");

        let text = ToolOutput::Ok {
            value: serde_json::json!("plain"),
        };
        assert_eq!(text.render(), "plain");

        let err = ToolOutput::Error {
            error: ToolFailure::Execution("upstream timed out".into()),
        };
        assert!(err.render().starts_with("Error:"));
        assert!(err.render().contains("upstream timed out"));
    }

    #[test]
    fn tool_message_serializes_with_tags() {
        let msg = Message::stamped(
            2,
            NewMessage::tool(ToolResultPayload {
                call_id: "call_1".into(),
                tool_name: "get_stock_price".into(),
                arguments: serde_json::json!({"ticker": "X"}),
                output: ToolOutput::Ok {
                    value: serde_json::json!(42),
                },
                served_from_cache: false,
            }),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["content"]["type"], "tool_result");
        assert_eq!(json["content"]["output"]["status"], "ok");
        assert_eq!(json["content"]["output"]["value"], 42);
    }

    #[test]
    fn thread_id_display() {
        let id = ThreadId::from("t1");
        assert_eq!(id.to_string(), "t1");
        assert_eq!(id.as_str(), "t1");
    }
}
