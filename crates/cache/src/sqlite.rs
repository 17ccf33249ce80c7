//! SQLite cache store.
//!
//! A single `cache_entries` table keyed by cache key. Expiry is stored as
//! unix milliseconds and checked on read; stale rows are swept on write.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use nexus_core::cache::CacheStore;
use nexus_core::error::CacheError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// A cache store persisted in SQLite, shared across restarts.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open (or create) the cache database at `path`.
    pub async fn new(path: &str) -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CacheError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let cache = Self { pool };
        cache.run_migrations().await?;
        info!("SQLite cache initialized at {path}");
        Ok(cache)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, CacheError> {
        let cache = Self { pool };
        cache.run_migrations().await?;
        Ok(cache)
    }

    async fn run_migrations(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key         TEXT PRIMARY KEY NOT NULL,
                value       TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(format!("cache_entries table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries(expires_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(format!("expires_at index: {e}")))?;

        Ok(())
    }

    /// Delete expired rows. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheStore for SqliteCache {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(now_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = now_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_ms);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CacheError::Backend(e.to_string()))?;

        let swept = self.purge_expired().await?;
        if swept > 0 {
            debug!(swept, "Purged expired cache rows");
        }
        Ok(())
    }
}
