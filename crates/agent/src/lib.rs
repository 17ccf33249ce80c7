//! # Nexus Agent
//!
//! The conversation runtime: an agent loop that alternates reasoning calls
//! with tool dispatch and streams every step to the caller as ordered
//! events.
//!
//! - [`ConversationRuntime`] accepts a turn and hands back an [`EventStream`]
//! - [`AgentLoop`] drives the turn's state machine
//! - [`event_channel`] connects the two with back-pressure and cancellation

pub mod encoder;
pub mod loop_runner;
pub mod runtime;
pub mod stream_event;

#[cfg(test)]
mod test_helpers;

pub use encoder::{EventSink, EventStream, event_channel};
pub use loop_runner::{AgentLoop, BUDGET_NOTICE, LoopSettings, LoopState, TurnSummary};
pub use runtime::ConversationRuntime;
pub use stream_event::{ErrorCode, FinishReason, SequencedEvent, StreamEvent};
