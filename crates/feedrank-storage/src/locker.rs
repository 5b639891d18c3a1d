//! Distributed lock capability and its Redis implementation.
//!
//! The scheduler depends on two properties: `acquire` is a single-winner
//! compare-and-set with TTL auto-release, and `release` is token-safe (a
//! stale or non-owner release is a no-op, not an error).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Error from the lock backend.
#[derive(Debug, Error)]
#[error("lock {op}: {source}")]
pub struct LockError {
    op: &'static str,
    #[source]
    source: redis::RedisError,
}

/// Distributed lock capability across service instances.
#[async_trait]
pub trait DistributedLocker: Send + Sync {
    /// Attempts to take the lock. `Ok(false)` means another instance holds
    /// it. The lock auto-expires after `ttl` if never released.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Releases the lock if this instance owns it; otherwise a no-op.
    async fn release(&self, key: &str) -> Result<(), LockError>;
}

/// Deletes the key only when it still holds this owner's token, so an
/// expired-and-reacquired lock is never released out from under its new
/// holder.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed [`DistributedLocker`]: `SET key token NX PX ttl` for the
/// single-winner acquire, token-checked Lua delete for the release. Owned
/// tokens are tracked per key so only the acquiring process can release.
pub struct RedisLocker {
    conn: ConnectionManager,
    owned: Mutex<HashMap<String, String>>,
}

impl RedisLocker {
    #[must_use]
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            owned: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl DistributedLocker for RedisLocker {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let token = Uuid::new_v4().to_string();
        let mut conn = self.conn.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|source| LockError {
                op: "acquire",
                source,
            })?;

        if reply.is_none() {
            tracing::debug!(key, "lock already held by another instance");
            return Ok(false);
        }

        self.owned.lock().await.insert(key.to_string(), token);
        tracing::debug!(key, ttl_ms = ttl.as_millis() as u64, "lock acquired");
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        let Some(token) = self.owned.lock().await.remove(key) else {
            tracing::debug!(key, "lock not owned by this instance; nothing to release");
            return Ok(());
        };

        let mut conn = self.conn.clone();
        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|source| LockError {
                op: "release",
                source,
            })?;

        if released == 1 {
            tracing::debug!(key, "lock released");
        } else {
            tracing::debug!(key, "lock already expired or re-acquired elsewhere");
        }

        Ok(())
    }
}
