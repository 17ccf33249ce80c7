//! # Nexus Core
//!
//! Domain types, traits, and error definitions for the Nexus conversation
//! runtime. This crate has **no framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here. Implementations
//! live in their respective crates:
//! - [`ReasoningProvider`] in `nexus-providers`
//! - [`CacheStore`] in `nexus-cache`
//! - [`ThreadStore`] in `nexus-sessions`
//! - [`Tool`] in `nexus-tools`

pub mod cache;
pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod thread;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use cache::CacheStore;
pub use error::{CacheError, Error, ProviderError, Result, StoreError, SubmitError, ToolFailure};
pub use message::{Message, MessageContent, NewMessage, Role, ThreadId, ToolOutput, ToolResultPayload};
pub use provider::{Fragment, FragmentStream, ReasoningProvider, ReasoningRequest};
pub use schema::{ArgumentSchema, CanonicalArgs, FieldKind, FieldSpec, Normalize};
pub use thread::{ConversationThread, ThreadLease, ThreadStore};
pub use tool::{Tool, ToolCallRequest, ToolDefinition, ToolInvocationResult};
