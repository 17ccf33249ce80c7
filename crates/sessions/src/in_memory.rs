//! In-process thread store.
//!
//! One mutex guards every thread. Appends and the busy flag are plain
//! in-memory updates, so the lock is never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use nexus_core::error::StoreError;
use nexus_core::message::{Message, NewMessage, ThreadId};
use nexus_core::thread::{ConversationThread, ThreadStore};
use tokio::time::Instant;
use tracing::debug;

struct Slot {
    thread: ConversationThread,
    touched: Instant,
}

impl Slot {
    fn new(id: ThreadId) -> Self {
        Self {
            thread: ConversationThread::new(id),
            touched: Instant::now(),
        }
    }
}

/// Threads held in a `HashMap`, optionally evicted when idle.
///
/// Busy threads are never evicted.
pub struct InMemoryThreadStore {
    threads: Mutex<HashMap<ThreadId, Slot>>,
    idle_ttl: Option<Duration>,
    max_threads: Option<usize>,
}

impl InMemoryThreadStore {
    /// A store that keeps every thread forever.
    pub fn new() -> Self {
        Self::with_eviction(None, None)
    }

    /// A store that drops threads idle longer than `idle_ttl` and, past
    /// `max_threads`, the least recently used idle threads.
    pub fn with_eviction(idle_ttl: Option<Duration>, max_threads: Option<usize>) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            idle_ttl,
            max_threads,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ThreadId, Slot>> {
        self.threads.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Full copy of a thread, if it exists.
    pub fn get(&self, thread_id: &ThreadId) -> Option<ConversationThread> {
        self.lock().get(thread_id).map(|s| s.thread.clone())
    }

    /// Number of retained threads.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the eviction policy now. Returns how many threads were dropped.
    pub fn evict(&self) -> usize {
        let mut threads = self.lock();
        Self::evict_locked(&mut threads, self.idle_ttl, self.max_threads)
    }

    fn evict_locked(
        threads: &mut HashMap<ThreadId, Slot>,
        idle_ttl: Option<Duration>,
        max_threads: Option<usize>,
    ) -> usize {
        let before = threads.len();

        if let Some(ttl) = idle_ttl {
            let now = Instant::now();
            threads.retain(|_, s| s.thread.busy || now.duration_since(s.touched) < ttl);
        }

        if let Some(max) = max_threads
            && threads.len() > max
        {
            let mut idle: Vec<(ThreadId, Instant)> = threads
                .iter()
                .filter(|(_, s)| !s.thread.busy)
                .map(|(id, s)| (id.clone(), s.touched))
                .collect();
            idle.sort_by_key(|(_, touched)| *touched);

            let excess = threads.len() - max;
            for (id, _) in idle.into_iter().take(excess) {
                threads.remove(&id);
            }
        }

        let evicted = before - threads.len();
        if evicted > 0 {
            debug!(evicted, remaining = threads.len(), "Evicted idle threads");
        }
        evicted
    }
}

impl Default for InMemoryThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn append(&self, thread_id: &ThreadId, message: NewMessage) -> Result<Message, StoreError> {
        let mut threads = self.lock();
        let slot = threads
            .entry(thread_id.clone())
            .or_insert_with(|| Slot::new(thread_id.clone()));
        slot.touched = Instant::now();
        Ok(slot.thread.push(message))
    }

    async fn snapshot(&self, thread_id: &ThreadId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .lock()
            .get(thread_id)
            .map(|s| s.thread.messages.clone())
            .unwrap_or_default())
    }

    fn try_acquire(&self, thread_id: &ThreadId) -> bool {
        let mut threads = self.lock();
        Self::evict_locked(&mut threads, self.idle_ttl, self.max_threads);

        let slot = threads
            .entry(thread_id.clone())
            .or_insert_with(|| Slot::new(thread_id.clone()));
        if slot.thread.busy {
            return false;
        }
        slot.thread.busy = true;
        slot.touched = Instant::now();
        true
    }

    fn release(&self, thread_id: &ThreadId) {
        if let Some(slot) = self.lock().get_mut(thread_id) {
            slot.thread.busy = false;
            slot.touched = Instant::now();
        }
    }
}
