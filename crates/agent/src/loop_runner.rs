//! The agent reasoning loop implementation.
//!
//! One [`AgentLoop::run`] call drives one turn on one thread:
//!
//! 1. **Reason**: send the thread history and tool definitions to the provider
//! 2. **Stream**: forward text fragments to the caller as `token` events
//! 3. **Act**: if the output resolved to tool calls, dispatch them
//!    concurrently, record every result, and go back to 1
//! 4. **Finalize**: if it resolved to text, commit it as the answer
//!
//! The step budget bounds how many times step 3 can happen.

use std::sync::Arc;

use futures::StreamExt;
use nexus_config::AppConfig;
use nexus_core::error::ProviderError;
use nexus_core::message::{NewMessage, ThreadId};
use nexus_core::provider::{Fragment, ReasoningProvider, ReasoningRequest};
use nexus_core::thread::{ThreadLease, ThreadStore};
use nexus_core::tool::ToolCallRequest;
use nexus_tools::ToolDispatcher;
use tracing::{debug, error, info, warn};

use crate::encoder::EventSink;
use crate::stream_event::{ErrorCode, FinishReason, StreamEvent};

/// Answer committed when the budget runs out before the model said anything.
pub const BUDGET_NOTICE: &str =
    "I could not finish this request within the allowed number of steps. \
     The tool results gathered so far are in the conversation history.";

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    AwaitingReasoning,
    DispatchingTools,
    Finalizing,
    Done,
    Errored,
    Cancelled,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored | Self::Cancelled)
    }
}

/// Static settings of the loop.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Maximum reasoning ↔ tool round-trips per turn (at least 1)
    pub max_steps: u32,
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            max_steps: config.agent.max_steps,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            system_prompt: None,
            temperature: 0.3,
            max_tokens: None,
            max_steps: 8,
        }
    }
}

/// What one turn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub final_state: LoopState,
    pub steps: u32,
    pub tool_calls: usize,
}

/// Why a turn stopped early.
enum Abort {
    Cancelled,
    Provider(ProviderError),
    Internal(String),
}

/// How one reasoning step resolved.
enum StepOutput {
    Answer(String),
    ToolCalls {
        calls: Vec<ToolCallRequest>,
        text: String,
    },
}

/// The agent loop that orchestrates reasoning calls and tool execution.
pub struct AgentLoop {
    provider: Arc<dyn ReasoningProvider>,
    dispatcher: Arc<ToolDispatcher>,
    store: Arc<dyn ThreadStore>,
    settings: LoopSettings,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        dispatcher: Arc<ToolDispatcher>,
        store: Arc<dyn ThreadStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            store,
            settings: LoopSettings {
                max_steps: settings.max_steps.max(1),
                ..settings
            },
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        &self.store
    }

    /// Run one turn. The user message must already be in the thread.
    ///
    /// The lease is released before the terminal event goes out, so a caller
    /// that sees `done` can submit again immediately.
    pub async fn run(&self, lease: ThreadLease, mut sink: EventSink) -> TurnSummary {
        let thread_id = lease.thread_id().clone();
        let mut turn = Turn {
            thread_id: &thread_id,
            state: LoopState::Idle,
            steps: 0,
            rounds: 0,
            tool_calls: 0,
        };
        turn.transition(LoopState::AwaitingReasoning);

        let outcome = self.drive(&mut turn, &mut sink).await;

        let terminal = match outcome {
            Ok(finish_reason) => {
                turn.transition(LoopState::Done);
                info!(
                    thread_id = %thread_id,
                    steps = turn.steps,
                    tool_calls = turn.tool_calls,
                    ?finish_reason,
                    "Turn complete"
                );
                StreamEvent::Done {
                    thread_id: thread_id.clone(),
                    steps: turn.steps,
                    tool_calls: turn.tool_calls,
                    finish_reason,
                }
            }
            Err(Abort::Cancelled) => {
                turn.transition(LoopState::Cancelled);
                info!(thread_id = %thread_id, steps = turn.steps, "Turn cancelled");
                StreamEvent::error(ErrorCode::Cancelled, "turn cancelled")
            }
            Err(Abort::Provider(e)) => {
                turn.transition(LoopState::Errored);
                error!(thread_id = %thread_id, error = %e, "Reasoning provider failed");
                StreamEvent::error(ErrorCode::Provider, e.to_string())
            }
            Err(Abort::Internal(message)) => {
                turn.transition(LoopState::Errored);
                error!(thread_id = %thread_id, error = %message, "Turn failed");
                StreamEvent::error(ErrorCode::Internal, message)
            }
        };

        drop(lease);
        sink.emit(terminal).await;

        TurnSummary {
            final_state: turn.state,
            steps: turn.steps,
            tool_calls: turn.tool_calls,
        }
    }

    async fn drive(&self, turn: &mut Turn<'_>, sink: &mut EventSink) -> Result<FinishReason, Abort> {
        let definitions = self.dispatcher.definitions();
        let mut last_text = String::new();

        loop {
            if sink.is_cancelled() {
                return Err(Abort::Cancelled);
            }

            if turn.rounds >= self.settings.max_steps {
                warn!(
                    thread_id = %turn.thread_id,
                    max_steps = self.settings.max_steps,
                    "Step budget exhausted, finalizing"
                );
                turn.transition(LoopState::Finalizing);
                let answer = if last_text.trim().is_empty() {
                    sink.emit(StreamEvent::Token {
                        text: BUDGET_NOTICE.into(),
                    })
                    .await;
                    BUDGET_NOTICE.to_string()
                } else {
                    last_text
                };
                self.commit(turn.thread_id, NewMessage::assistant(answer)).await?;
                return Ok(FinishReason::StepBudgetExhausted);
            }

            turn.steps += 1;
            match self.reason(turn, sink, &definitions).await? {
                StepOutput::Answer(text) => {
                    turn.transition(LoopState::Finalizing);
                    self.commit(turn.thread_id, NewMessage::assistant(text)).await?;
                    return Ok(FinishReason::Completed);
                }
                StepOutput::ToolCalls { calls, text } => {
                    turn.transition(LoopState::DispatchingTools);
                    turn.rounds += 1;
                    last_text = text;
                    self.act(turn, sink, calls).await?;
                    turn.transition(LoopState::AwaitingReasoning);
                }
            }
        }
    }

    /// One reasoning call, streamed.
    async fn reason(
        &self,
        turn: &Turn<'_>,
        sink: &mut EventSink,
        definitions: &[nexus_core::tool::ToolDefinition],
    ) -> Result<StepOutput, Abort> {
        let history = self
            .store
            .snapshot(turn.thread_id)
            .await
            .map_err(|e| Abort::Internal(e.to_string()))?;

        debug!(
            thread_id = %turn.thread_id,
            step = turn.steps,
            history = history.len(),
            "Requesting reasoning step"
        );

        let request = ReasoningRequest {
            model: self.settings.model.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            messages: history,
            tools: definitions.to_vec(),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let mut fragments = self.provider.converse(request).await.map_err(Abort::Provider)?;

        let mut text = String::new();
        let mut calls: Vec<ToolCallRequest> = Vec::new();

        while let Some(fragment) = fragments.next().await {
            match fragment.map_err(Abort::Provider)? {
                Fragment::Text { text: piece } => {
                    if piece.is_empty() {
                        continue;
                    }
                    text.push_str(&piece);
                    if !sink.emit(StreamEvent::Token { text: piece }).await {
                        return Err(Abort::Cancelled);
                    }
                }
                Fragment::ToolCalls { calls: more } => calls.extend(more),
            }
            if sink.is_cancelled() {
                return Err(Abort::Cancelled);
            }
        }

        if calls.is_empty() {
            Ok(StepOutput::Answer(text))
        } else {
            Ok(StepOutput::ToolCalls { calls, text })
        }
    }

    /// Dispatch one step's tool calls and record the results.
    async fn act(
        &self,
        turn: &mut Turn<'_>,
        sink: &mut EventSink,
        calls: Vec<ToolCallRequest>,
    ) -> Result<(), Abort> {
        debug!(
            thread_id = %turn.thread_id,
            step = turn.steps,
            tool_count = calls.len(),
            "Dispatching tool calls"
        );

        for call in &calls {
            let issued = StreamEvent::ToolCallIssued {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            };
            if !sink.emit(issued).await {
                return Err(Abort::Cancelled);
            }
        }

        let results = self.dispatcher.dispatch_all(&calls).await;
        turn.tool_calls += results.len();

        // In-flight calls finished; their results are dropped if the caller left.
        if sink.is_cancelled() {
            return Err(Abort::Cancelled);
        }

        // A step's results land in the thread together or not at all, so
        // every result is delivered before any is committed.
        let mut payloads = Vec::with_capacity(results.len());
        for result in results {
            let latency_ms = result.latency.as_millis() as u64;
            let payload = result.into_payload();
            let event = StreamEvent::ToolResult {
                call_id: payload.call_id.clone(),
                tool_name: payload.tool_name.clone(),
                output: payload.output.clone(),
                served_from_cache: payload.served_from_cache,
                latency_ms,
            };
            if !sink.emit(event).await {
                return Err(Abort::Cancelled);
            }
            payloads.push(payload);
        }

        for payload in payloads {
            self.commit(turn.thread_id, NewMessage::tool(payload)).await?;
        }

        Ok(())
    }

    async fn commit(&self, thread_id: &ThreadId, message: NewMessage) -> Result<(), Abort> {
        self.store
            .append(thread_id, message)
            .await
            .map(|_| ())
            .map_err(|e| Abort::Internal(e.to_string()))
    }
}

struct Turn<'a> {
    thread_id: &'a ThreadId,
    state: LoopState,
    /// Reasoning calls made
    steps: u32,
    /// Tool rounds dispatched
    rounds: u32,
    tool_calls: usize,
}

impl Turn<'_> {
    fn transition(&mut self, to: LoopState) {
        debug!(thread_id = %self.thread_id, from = ?self.state, to = ?to, "Loop transition");
        self.state = to;
    }
}
