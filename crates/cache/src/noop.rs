//! Degenerate cache stores: one that is always empty and one that is
//! always down.

use std::time::Duration;

use async_trait::async_trait;
use nexus_core::cache::CacheStore;
use nexus_core::error::CacheError;

/// A cache that stores nothing. Every lookup is a miss.
pub struct NoopCache;

#[async_trait]
impl CacheStore for NoopCache {
    fn name(&self) -> &str {
        "none"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A cache whose every operation fails, as if the store were unreachable.
///
/// Serving traffic through it must behave exactly like caching disabled.
pub struct UnavailableCache {
    reason: String,
}

impl UnavailableCache {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Default for UnavailableCache {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

#[async_trait]
impl CacheStore for UnavailableCache {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable(self.reason.clone()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable(self.reason.clone()))
    }
}
