//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any other endpoint that
//! speaks `/v1/chat/completions` with streaming SSE and function calling.
//!
//! Thread history is flattened to the chat format here. Tool messages carry
//! the call that produced them, so the assistant `tool_calls` message the
//! API expects is rebuilt from each consecutive run of tool results.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use nexus_core::error::ProviderError;
use nexus_core::message::{Message, MessageContent, Role, ToolResultPayload};
use nexus_core::provider::{Fragment, FragmentStream, ReasoningProvider, ReasoningRequest};
use nexus_core::tool::{ToolCallRequest, ToolDefinition};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence allowed between two reads of a response, headers
/// included. A long answer may stream for as long as it keeps producing.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

fn http_client(read_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()
        .unwrap_or_default()
}

/// An OpenAI-compatible reasoning provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: http_client(READ_TIMEOUT),
        }
    }

    /// Replace the idle read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    /// Convert the system prompt and thread history to the chat format.
    fn to_api_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 2);

        if let Some(prompt) = system_prompt {
            out.push(ApiMessage::text("system", prompt));
        }

        let mut pending: Vec<&ToolResultPayload> = Vec::new();
        for message in messages {
            match (&message.role, &message.content) {
                (_, MessageContent::ToolResult(payload)) => pending.push(payload),
                (role, MessageContent::Text { text }) => {
                    Self::flush_tool_results(&mut pending, &mut out);
                    let role = match role {
                        Role::User => "user",
                        Role::Assistant | Role::Tool => "assistant",
                    };
                    out.push(ApiMessage::text(role, text));
                }
            }
        }
        Self::flush_tool_results(&mut pending, &mut out);

        out
    }

    /// Emit one assistant `tool_calls` message followed by its tool replies.
    fn flush_tool_results(pending: &mut Vec<&ToolResultPayload>, out: &mut Vec<ApiMessage>) {
        if pending.is_empty() {
            return;
        }

        out.push(ApiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(
                pending
                    .iter()
                    .map(|p| ApiToolCall {
                        id: p.call_id.clone(),
                        r#type: "function".into(),
                        function: ApiFunction {
                            name: p.tool_name.clone(),
                            arguments: p.arguments.to_string(),
                        },
                    })
                    .collect(),
            ),
            tool_call_id: None,
        });

        for payload in pending.drain(..) {
            out.push(ApiMessage {
                role: "tool".into(),
                content: Some(payload.output.render()),
                tool_calls: None,
                tool_call_id: Some(payload.call_id.clone()),
            });
        }
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ReasoningRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system_prompt.as_deref(), &request.messages),
            "temperature": request.temperature,
            "stream": true,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        body
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn converse(&self, request: ReasoningRequest) -> Result<FragmentStream, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            history = request.messages.len(),
            tools = request.tools.len(),
            "Sending streaming request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, "Provider streaming error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream and forward decoded fragments
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = StreamDecoder::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for fragment in decoder.push(&bytes) {
                    if tx.send(Ok(fragment)).await.is_err() {
                        trace!(provider = %provider_name, "Fragment receiver dropped");
                        return;
                    }
                }

                if decoder.is_done() {
                    break;
                }
            }

            if let Some(fragment) = decoder.finish() {
                let _ = tx.send(Ok(fragment)).await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Incremental decoder for the chat completions SSE stream.
///
/// Text deltas are yielded as they arrive. Tool call deltas are accumulated
/// by index and released as a single [`Fragment::ToolCalls`] once the stream
/// ends.
#[derive(Default)]
struct StreamDecoder {
    buffer: Vec<u8>,
    tool_calls: BTreeMap<u32, ToolCallAccumulator>,
    done: bool,
}

impl StreamDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }
        self.buffer.extend_from_slice(bytes);

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                self.done = true;
                break;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(resp) => {
                    let Some(choice) = resp.choices.into_iter().next() else {
                        continue;
                    };

                    for delta in choice.delta.tool_calls.unwrap_or_default() {
                        let acc = self.tool_calls.entry(delta.index).or_default();
                        if let Some(id) = delta.id {
                            acc.id = id;
                        }
                        if let Some(func) = delta.function {
                            if let Some(name) = func.name {
                                acc.name = name;
                            }
                            if let Some(args) = func.arguments {
                                acc.arguments.push_str(&args);
                            }
                        }
                    }

                    if let Some(text) = choice.delta.content.filter(|c| !c.is_empty()) {
                        fragments.push(Fragment::Text { text });
                    }
                }
                Err(e) => {
                    trace!(error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }

        fragments
    }

    fn is_done(&self) -> bool {
        self.done
    }

    /// Release accumulated tool calls, if any.
    fn finish(&mut self) -> Option<Fragment> {
        if self.tool_calls.is_empty() {
            return None;
        }
        let calls = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallAccumulator::into_request)
            .collect();
        Some(Fragment::ToolCalls { calls })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta, arriving incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Accumulates incremental tool call deltas into a complete tool call.
#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    /// Arguments that are not valid JSON are passed through as a string so
    /// schema validation reports them to the model.
    fn into_request(self) -> ToolCallRequest {
        let arguments = if self.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or(serde_json::Value::String(self.arguments))
        };
        ToolCallRequest {
            id: self.id,
            name: self.name,
            arguments,
        }
    }
}
