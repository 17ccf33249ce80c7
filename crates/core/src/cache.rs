//! Cache store trait: key/value storage with per-entry expiry.
//!
//! Implementations may be remote and may fail at any time. Callers are
//! expected to treat a failure exactly like a miss; see the cache-aside
//! wrapper in `nexus-tools`.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheError;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Fetch a live entry. Entries past their expiry are never returned.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store an entry that expires `ttl` from now.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}
