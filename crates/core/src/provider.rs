//! Reasoning provider trait: the abstraction over completion backends.
//!
//! A provider receives the thread history plus the tool definitions and
//! answers with a stream of fragments. In aggregate the fragments resolve to
//! either a final answer (text only) or one or more tool call requests. The
//! runtime never looks deeper than that shape.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolDefinition};

/// Everything a provider needs for one reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// Optional system instructions, prepended by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Ordered thread history
    pub messages: Vec<Message>,

    /// Tools the model may call (empty = answer directly)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.3
}

/// One piece of provider output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fragment {
    /// Partial answer text
    Text { text: String },

    /// Tool calls requested by the model
    ToolCalls { calls: Vec<ToolCallRequest> },
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// A boxed stream of provider fragments.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<Fragment, ProviderError>> + Send + 'static>>;

/// The core provider trait.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai").
    fn name(&self) -> &str;

    /// Start a reasoning step.
    ///
    /// Errors returned here, or yielded by the stream, end the turn.
    async fn converse(&self, request: ReasoningRequest) -> Result<FragmentStream, ProviderError>;
}
