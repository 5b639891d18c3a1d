//! Persistence for feedrank: the Postgres content repository with its
//! full-text ranking schema, plus the Redis-backed cache and distributed
//! lock. In-memory implementations of the same capability traits live in
//! [`memory`] for tests and single-node runs.

use thiserror::Error;

pub mod cache;
pub mod connection;
pub mod locker;
pub mod memory;
pub mod migrations;
pub mod redis;
pub mod repository;

pub use cache::{Cache, CacheError, RedisCache};
pub use connection::{connect, health_check, DatabaseConfig};
pub use locker::{DistributedLocker, LockError, RedisLocker};
pub use memory::{MemoryCache, MemoryLocker, MemoryRepository};
pub use redis::{connect_redis, RedisConfig};
pub use repository::{ContentRepository, PgContentRepository};

pub const CRATE_NAME: &str = "feedrank-storage";

/// Errors from the relational store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{op}: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("applying migration {id}: {source}")]
    Migration {
        id: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StorageError {
    pub(crate) fn query(op: &'static str, source: sqlx::Error) -> Self {
        Self::Query { op, source }
    }
}
