//! Test doubles shared by the service test modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use feedrank_core::Content;
use feedrank_providers::{Provider, ProviderError};
use feedrank_storage::{Cache, CacheError};

/// Provider returning a fixed batch on every fetch.
pub struct StaticProvider {
    name: &'static str,
    items: Vec<Content>,
}

impl StaticProvider {
    pub fn new(name: &'static str, items: Vec<Content>) -> Self {
        Self { name, items }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Content>, ProviderError> {
        Ok(self.items.clone())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Provider whose fetch always fails with a terminal status error.
pub struct FailingProvider {
    name: &'static str,
}

impl FailingProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Content>, ProviderError> {
        Err(ProviderError::Status {
            status: 503,
            url: format!("http://{}.test/feed", self.name),
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Err(ProviderError::Status {
            status: 503,
            url: format!("http://{}.test/health", self.name),
        })
    }
}

/// Provider counting fetches; returns an empty batch.
pub struct CountingProvider {
    name: &'static str,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for CountingProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self) -> Result<Vec<Content>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Cache whose every operation fails, for fail-open coverage.
pub struct FailingCache;

fn backend_down(op: &'static str) -> CacheError {
    CacheError::new(
        op,
        redis::RedisError::from((redis::ErrorKind::IoError, "cache backend down")),
    )
}

#[async_trait]
impl Cache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(backend_down("get"))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Err(backend_down("set"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(backend_down("delete"))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        Err(backend_down("clear"))
    }
}
