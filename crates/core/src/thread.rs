//! Thread store trait: per-thread history with a single writer.
//!
//! `try_acquire`/`release` are synchronous on purpose: they must never wait
//! for another loop, and [`ThreadLease`] has to be able to release from
//! `Drop`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{Message, NewMessage, ThreadId};

/// A conversation thread as held by a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationThread {
    pub id: ThreadId,
    pub messages: Vec<Message>,
    pub last_activity: DateTime<Utc>,
    pub busy: bool,
}

impl ConversationThread {
    pub fn new(id: ThreadId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            last_activity: Utc::now(),
            busy: false,
        }
    }

    /// Append a pending message, stamping the next sequence number.
    pub fn push(&mut self, message: NewMessage) -> Message {
        let seq = self.messages.last().map_or(1, |m| m.seq + 1);
        let stamped = Message::stamped(seq, message);
        self.last_activity = stamped.timestamp;
        self.messages.push(stamped.clone());
        stamped
    }
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Append to a thread, creating it if needed. Returns the stored message.
    async fn append(&self, thread_id: &ThreadId, message: NewMessage) -> Result<Message, StoreError>;

    /// Ordered copy of a thread's messages. Unknown threads are empty.
    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Vec<Message>, StoreError>;

    /// Mark the thread busy. Returns `false` without waiting if it already is.
    fn try_acquire(&self, thread_id: &ThreadId) -> bool;

    /// Clear the busy flag. Idempotent.
    fn release(&self, thread_id: &ThreadId);
}

/// Exclusive right to run a turn on one thread.
///
/// Dropping the lease releases the thread, so every exit path of the agent
/// loop gives it back.
pub struct ThreadLease {
    store: Arc<dyn ThreadStore>,
    thread_id: ThreadId,
}

impl ThreadLease {
    /// Try to take the thread. `None` means another turn holds it.
    pub fn acquire(store: Arc<dyn ThreadStore>, thread_id: ThreadId) -> Option<Self> {
        if store.try_acquire(&thread_id) {
            Some(Self { store, thread_id })
        } else {
            None
        }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.thread_id
    }

    pub fn store(&self) -> &Arc<dyn ThreadStore> {
        &self.store
    }
}

impl Drop for ThreadLease {
    fn drop(&mut self) {
        self.store.release(&self.thread_id);
        tracing::debug!(thread_id = %self.thread_id, "Thread released");
    }
}

impl std::fmt::Debug for ThreadLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLease")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}
