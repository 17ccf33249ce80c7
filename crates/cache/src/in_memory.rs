//! In-process cache with per-entry expiry.
//!
//! Expiry uses `tokio::time::Instant`, so tests can drive it with a paused
//! clock.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use nexus_core::cache::CacheStore;
use nexus_core::error::CacheError;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// An in-memory cache backed by a `HashMap`.
///
/// When `max_entries` is reached, expired entries are purged first and then
/// the entry closest to expiry is evicted.
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
}

impl InMemoryCache {
    /// An unbounded cache.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// A cache holding at most `max_entries` entries (0 = unbounded).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries,
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if self.max_entries > 0 && !entries.contains_key(key) && entries.len() >= self.max_entries {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.max_entries {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                    tracing::trace!("Cache full, evicted entry closest to expiry");
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}
