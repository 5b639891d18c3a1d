//! Result cache capability and its Redis implementation.
//!
//! The cache is never authoritative: callers treat every error here as a
//! miss and fall through to the repository.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use thiserror::Error;

/// Error from the cache backend.
#[derive(Debug, Error)]
#[error("cache {op}: {source}")]
pub struct CacheError {
    op: &'static str,
    #[source]
    source: redis::RedisError,
}

impl CacheError {
    #[must_use]
    pub fn new(op: &'static str, source: redis::RedisError) -> Self {
        Self { op, source }
    }
}

/// Cache capability set. TTL-based expiry only; no explicit invalidation on
/// the write path.
#[async_trait]
pub trait Cache: Send + Sync {
    /// `Ok(None)` on miss; a miss is not an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Drops every entry in this cache's namespace.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Redis-backed [`Cache`] with prefix-based namespacing.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisCache {
    #[must_use]
    pub fn new(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|source| CacheError::new("get", source))?;

        match &value {
            Some(data) => tracing::debug!(key, bytes = data.len(), "cache hit"),
            None => tracing::debug!(key, "cache miss"),
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("SET")
            .arg(self.full_key(key))
            .arg(value)
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|source| CacheError::new("set", source))?;

        tracing::debug!(key, bytes = value.len(), ttl_ms = ttl.as_millis() as u64, "cache set");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("DEL")
            .arg(self.full_key(key))
            .query_async(&mut conn)
            .await
            .map_err(|source| CacheError::new("delete", source))?;

        tracing::debug!(key, "cache delete");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:*", self.key_prefix);
        let mut cursor: u64 = 0;
        let mut removed: usize = 0;

        // Cursor-driven SCAN keeps this non-blocking on large keyspaces.
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|source| CacheError::new("clear", source))?;

            if !keys.is_empty() {
                removed += keys.len();
                let () = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|source| CacheError::new("clear", source))?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        tracing::info!(count = removed, "cache cleared");
        Ok(())
    }
}
