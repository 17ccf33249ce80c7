//! Cache store implementations for Nexus.

pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryCache;
pub use noop::{NoopCache, UnavailableCache};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;

use std::sync::Arc;

use nexus_config::CacheConfig;
use nexus_core::cache::CacheStore;
use nexus_core::error::CacheError;

/// Build the cache store named by `config.backend`.
pub async fn build_from_config(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, CacheError> {
    let store: Arc<dyn CacheStore> = match config.backend.as_str() {
        "none" => Arc::new(NoopCache),
        #[cfg(feature = "sqlite")]
        "sqlite" => Arc::new(SqliteCache::new(&config.path).await?),
        #[cfg(not(feature = "sqlite"))]
        "sqlite" => {
            return Err(CacheError::Unavailable(
                "built without the `sqlite` feature".into(),
            ));
        }
        _ => Arc::new(InMemoryCache::with_capacity(config.max_entries)),
    };
    tracing::info!(backend = store.name(), "Cache store ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_memory_by_default() {
        let store = build_from_config(&CacheConfig::default()).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[tokio::test]
    async fn builds_noop() {
        let config = CacheConfig {
            backend: "none".into(),
            ..Default::default()
        };
        let store = build_from_config(&config).await.unwrap();
        assert_eq!(store.name(), "none");
    }
}
