//! In-memory implementations of the storage capability traits.
//!
//! Used by tests and by cache-less single-node runs. The repository keeps
//! rows in a `HashMap` keyed by the natural key and approximates text
//! matching with case-insensitive token containment over title and tags;
//! relevance ordering degrades to score order. Upsert semantics (stable
//! `id`, preserved `created_at`, bumped `updated_at`) match Postgres.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use feedrank_core::{Content, SearchParams, SearchResult, SortField, SortOrder};

use crate::cache::{Cache, CacheError};
use crate::locker::{DistributedLocker, LockError};
use crate::repository::ContentRepository;
use crate::StorageError;

// ─── Repository ─────────────────────────────────────────────────────────────

/// In-memory [`ContentRepository`].
#[derive(Default)]
pub struct MemoryRepository {
    rows: RwLock<HashMap<(String, String), Content>>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_query(content: &Content, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let haystack = {
        let mut text = content.title.to_lowercase();
        for tag in &content.tags {
            text.push(' ');
            text.push_str(&tag.to_lowercase());
        }
        text
    };
    query
        .split_whitespace()
        .all(|token| haystack.contains(&token.to_lowercase()))
}

fn compare(a: &Content, b: &Content, params: &SearchParams) -> std::cmp::Ordering {
    let ordering = match params.sort_by {
        SortField::PublishedAt => a.published_at.cmp(&b.published_at),
        SortField::Relevance | SortField::Score => a
            .score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal),
    };
    match params.sort_order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl ContentRepository for MemoryRepository {
    async fn search(&self, params: SearchParams) -> Result<SearchResult, StorageError> {
        let params = params.clamped();
        let rows = self.rows.read().await;

        let mut matching: Vec<Content> = rows
            .values()
            .filter(|content| matches_query(content, &params.query))
            .filter(|content| {
                params
                    .content_type
                    .is_none_or(|wanted| content.content_type == wanted)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare(a, b, &params));

        let total = matching.len() as i64;
        let page: Vec<Content> = matching
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.page_size as usize)
            .collect();

        Ok(SearchResult::new(page, total, &params))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Content>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows.values().find(|content| content.id == id).cloned())
    }

    async fn get_by_provider_and_external_id(
        &self,
        provider_id: &str,
        external_id: &str,
    ) -> Result<Option<Content>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(provider_id.to_string(), external_id.to_string()))
            .cloned())
    }

    async fn upsert(&self, content: &Content) -> Result<Content, StorageError> {
        let mut rows = self.rows.write().await;
        let key = (content.provider_id.clone(), content.external_id.clone());
        let now = Utc::now();

        let stored = match rows.get(&key) {
            Some(existing) => Content {
                id: existing.id,
                created_at: existing.created_at,
                updated_at: now,
                ..content.clone()
            },
            None => Content {
                id: Uuid::new_v4(),
                created_at: now,
                updated_at: now,
                ..content.clone()
            },
        };

        rows.insert(key, stored.clone());
        Ok(stored)
    }

    async fn bulk_upsert(&self, contents: &[Content]) -> Result<u64, StorageError> {
        for content in contents {
            self.upsert(content).await?;
        }
        Ok(contents.len() as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        let mut rows = self.rows.write().await;
        rows.retain(|_, content| content.id != id);
        Ok(())
    }

    async fn count(&self, params: SearchParams) -> Result<i64, StorageError> {
        let params = params.clamped();
        let rows = self.rows.read().await;
        let count = rows
            .values()
            .filter(|content| matches_query(content, &params.query))
            .filter(|content| {
                params
                    .content_type
                    .is_none_or(|wanted| content.content_type == wanted)
            })
            .count();
        Ok(count as i64)
    }
}

// ─── Cache ──────────────────────────────────────────────────────────────────

/// In-memory [`Cache`] with TTL expiry checked on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|(value, expires_at)| {
            if Instant::now() < *expires_at {
                Some(value.clone())
            } else {
                None
            }
        }))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value.to_vec(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

// ─── Locker ─────────────────────────────────────────────────────────────────

/// Process-local [`DistributedLocker`]. Coordinates schedulers that share
/// one instance of this struct; expiry uses the tokio clock so paused-time
/// tests stay deterministic.
#[derive(Default)]
pub struct MemoryLocker {
    held: Mutex<HashMap<String, Instant>>,
}

impl MemoryLocker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an unexpired lock currently exists for `key`.
    pub async fn is_held(&self, key: &str) -> bool {
        let held = self.held.lock().await;
        held.get(key).is_some_and(|expiry| Instant::now() < *expiry)
    }
}

#[async_trait]
impl DistributedLocker for MemoryLocker {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, LockError> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        if held.get(key).is_some_and(|expiry| now < *expiry) {
            return Ok(false);
        }
        held.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), LockError> {
        self.held.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrank_core::ContentType;

    fn content(provider: &str, external: &str, title: &str, score: f64) -> Content {
        Content {
            provider_id: provider.into(),
            external_id: external.into(),
            title: title.into(),
            content_type: ContentType::Video,
            score,
            published_at: Utc::now(),
            ..Content::default()
        }
    }

    #[tokio::test]
    async fn upsert_assigns_id_and_preserves_created_at() {
        let repo = MemoryRepository::new();
        let first = repo
            .upsert(&content("json_feed", "x1", "hello", 1.0))
            .await
            .unwrap();
        assert!(!first.id.is_nil());

        let second = repo
            .upsert(&content("json_feed", "x1", "hello again", 2.0))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);

        assert_eq!(repo.count(SearchParams::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_filters_and_orders_by_score() {
        let repo = MemoryRepository::new();
        repo.upsert(&content("p", "1", "go concurrency patterns", 10.0))
            .await
            .unwrap();
        repo.upsert(&content("p", "2", "cooking recipes", 99.0))
            .await
            .unwrap();
        repo.upsert(&content("p", "3", "concurrency in go", 50.0))
            .await
            .unwrap();

        let result = repo
            .search(SearchParams {
                query: "concurrency".into(),
                ..SearchParams::default()
            })
            .await
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.contents[0].external_id, "3");
        assert_eq!(result.contents[1].external_id, "1");
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        tokio::time::pause();
        let cache = MemoryCache::new();
        cache
            .set("k", b"v", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn locker_is_single_winner_until_expiry() {
        tokio::time::pause();
        let locker = MemoryLocker::new();
        assert!(locker.acquire("lock", Duration::from_secs(5)).await.unwrap());
        assert!(!locker.acquire("lock", Duration::from_secs(5)).await.unwrap());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(locker.acquire("lock", Duration::from_secs(5)).await.unwrap());

        locker.release("lock").await.unwrap();
        assert!(!locker.is_held("lock").await);
    }
}
