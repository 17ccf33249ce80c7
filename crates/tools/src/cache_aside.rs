//! Cache-aside wrapper around a [`CacheStore`].
//!
//! The cache is an optimization only. Every store failure is logged and
//! turned into a miss (reads) or a no-op (writes), so a request never fails
//! because the cache is down.

use std::sync::Arc;
use std::time::Duration;

use nexus_core::cache::CacheStore;
use nexus_core::schema::CanonicalArgs;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Deterministic cache key for a tool call: hex SHA-256 of
/// `tool_name` and the canonical argument text.
pub fn cache_key(tool_name: &str, args: &CanonicalArgs) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(args.canonical_string().as_bytes());
    format!("tool:{}", hex::encode(hasher.finalize()))
}

/// Bound on a single store call when none is configured.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
}

impl CacheAside {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_timeout(store, DEFAULT_CACHE_TIMEOUT)
    }

    /// A store call that takes longer than `timeout` counts as a failure.
    pub fn with_timeout(store: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn with_store_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// Cached JSON value, or `None` on miss, store failure, or a corrupt entry.
    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let Ok(read) = tokio::time::timeout(self.timeout, self.store.get(key)).await else {
            warn!(
                backend = self.store.name(),
                timeout_ms = self.timeout.as_millis() as u64,
                "Cache read timed out, treating as miss"
            );
            return None;
        };

        match read {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(backend = self.store.name(), error = %e, "Discarding corrupt cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(backend = self.store.name(), error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Best-effort write.
    pub async fn set(&self, key: &str, value: &serde_json::Value, ttl: Duration) {
        let raw = value.to_string();
        match tokio::time::timeout(self.timeout, self.store.set(key, raw, ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(backend = self.store.name(), error = %e, "Cache write failed, skipping");
            }
            Err(_) => {
                warn!(
                    backend = self.store.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Cache write timed out, skipping"
                );
            }
        }
    }
}
