//! Tool trait: the abstraction over external data sources.
//!
//! A tool is a named remote call with a typed argument schema and a caching
//! policy. Concrete tools live in `nexus-tools`; the dispatcher that
//! validates, caches and executes them lives there too.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolFailure;
use crate::message::{ToolOutput, ToolResultPayload};
use crate::schema::{ArgumentSchema, CanonicalArgs};

/// A tool definition sent to the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// A request from the reasoning engine to run a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique within the step that issued it
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw arguments, not yet validated
    pub arguments: serde_json::Value,
}

/// The outcome of dispatching one [`ToolCallRequest`].
#[derive(Debug, Clone)]
pub struct ToolInvocationResult {
    pub call_id: String,
    pub tool_name: String,
    /// Canonical arguments when validation succeeded, raw ones otherwise
    pub arguments: serde_json::Value,
    pub outcome: Result<serde_json::Value, ToolFailure>,
    pub served_from_cache: bool,
    pub latency: Duration,
}

impl ToolInvocationResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Convert into the payload recorded in thread history.
    pub fn into_payload(self) -> ToolResultPayload {
        ToolResultPayload {
            call_id: self.call_id,
            tool_name: self.tool_name,
            arguments: self.arguments,
            output: ToolOutput::from(self.outcome),
            served_from_cache: self.served_from_cache,
        }
    }
}

/// The core Tool trait.
///
/// `execute` only ever sees arguments that passed [`Tool::schema`]
/// validation. A zero [`Tool::ttl`] disables caching for the tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_stock_price").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the provider).
    fn description(&self) -> &str;

    /// Typed argument schema.
    fn schema(&self) -> &ArgumentSchema;

    /// How long a successful result stays fresh.
    fn ttl(&self) -> Duration;

    /// Perform the remote call.
    async fn execute(&self, arguments: &CanonicalArgs) -> Result<serde_json::Value, ToolFailure>;

    /// Convert this tool into a ToolDefinition for sending to the provider.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().to_json_schema(),
        }
    }
}
