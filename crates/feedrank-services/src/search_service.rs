//! Cache-aside search orchestration.
//!
//! The cache is optional and never authoritative: get errors, corrupt
//! entries, and set errors are logged and ignored, and the repository
//! answer is returned. Entries expire on their TTL; nothing invalidates
//! them on upsert (eventual consistency is accepted for this workload).

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use feedrank_core::{Content, SearchParams, SearchResult};
use feedrank_storage::{Cache, ContentRepository, StorageError};

/// Search read path over the repository with an optional result cache.
pub struct SearchService {
    repo: Arc<dyn ContentRepository>,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Duration,
}

impl SearchService {
    /// `cache` of `None` disables every cache interaction; the service is
    /// then equivalent to a direct repository call.
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        cache: Option<Arc<dyn Cache>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
        }
    }

    /// Clamps `params`, consults the cache, and falls through to the
    /// repository on miss, writing the result back with the configured TTL.
    pub async fn search(&self, params: SearchParams) -> Result<SearchResult, StorageError> {
        let params = params.clamped();
        let key = search_cache_key(&params);

        if let Some(cache) = &self.cache {
            match cache.get(&key).await {
                Ok(Some(data)) => match serde_json::from_slice::<SearchResult>(&data) {
                    Ok(result) => {
                        tracing::debug!(key = %key, "cache hit");
                        return Ok(result);
                    }
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "cache entry corrupt; querying repository");
                    }
                },
                Ok(None) => tracing::debug!(key = %key, "cache miss"),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "cache get failed; querying repository");
                }
            }
        }

        let result = self.repo.search(params).await?;

        if let Some(cache) = &self.cache {
            match serde_json::to_vec(&result) {
                Ok(data) => {
                    if let Err(err) = cache.set(&key, &data, self.cache_ttl).await {
                        tracing::warn!(key = %key, error = %err, "failed to cache search result");
                    }
                }
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "failed to serialise search result for caching");
                }
            }
        }

        Ok(result)
    }

    /// Single-item lookup; bypasses the cache.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Content>, StorageError> {
        self.repo.get_by_id(id).await
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        self.repo.count(SearchParams::default()).await
    }
}

/// Deterministic cache key for a set of (already clamped) search params.
/// Excludes the wall clock by construction; the backend adds the namespace
/// prefix.
pub(crate) fn search_cache_key(params: &SearchParams) -> String {
    format!(
        "search:{}:{}:{}:{}:{}:{}",
        params.query,
        params.content_type.map(|t| t.as_str()).unwrap_or(""),
        params.page,
        params.page_size,
        params.sort_by.as_str(),
        params.sort_order.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::FailingCache;
    use feedrank_core::{ContentType, SortField, SortOrder};
    use feedrank_storage::{ContentRepository, MemoryCache, MemoryRepository};

    fn seeded_repo() -> Arc<MemoryRepository> {
        Arc::new(MemoryRepository::new())
    }

    async fn seed(repo: &MemoryRepository, external_id: &str, title: &str, score: f64) {
        let content = Content {
            provider_id: "json_feed".into(),
            external_id: external_id.into(),
            title: title.into(),
            content_type: ContentType::Video,
            score,
            ..Content::default()
        };
        repo.upsert(&content).await.unwrap();
    }

    #[tokio::test]
    async fn without_cache_the_service_is_a_passthrough() {
        let repo = seeded_repo();
        seed(&repo, "a", "go concurrency", 10.0).await;

        let service = SearchService::new(repo, None, Duration::from_secs(60));
        let result = service.search(SearchParams::default()).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn caches_results_and_serves_the_snapshot_on_hit() {
        let repo = seeded_repo();
        seed(&repo, "a", "go concurrency", 10.0).await;

        let cache = Arc::new(MemoryCache::new());
        let service = SearchService::new(repo.clone(), Some(cache), Duration::from_secs(60));

        let first = service.search(SearchParams::default()).await.unwrap();
        assert_eq!(first.total, 1);

        // A new row appears, but the cached snapshot still answers.
        seed(&repo, "b", "another video", 5.0).await;
        let second = service.search(SearchParams::default()).await.unwrap();
        assert_eq!(second.total, 1);

        // A different page misses the cache and sees the fresh state.
        let other_page = service
            .search(SearchParams {
                page: 2,
                ..SearchParams::default()
            })
            .await
            .unwrap();
        assert_eq!(other_page.total, 2);
    }

    #[tokio::test]
    async fn cache_errors_fail_open_to_the_repository() {
        let repo = seeded_repo();
        seed(&repo, "a", "go concurrency", 10.0).await;

        let service = SearchService::new(
            repo,
            Some(Arc::new(FailingCache)),
            Duration::from_secs(60),
        );
        let result = service.search(SearchParams::default()).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn corrupt_cache_entries_fail_open_to_the_repository() {
        let repo = seeded_repo();
        seed(&repo, "a", "go concurrency", 10.0).await;

        let cache = Arc::new(MemoryCache::new());
        let params = SearchParams::default().clamped();
        cache
            .set(&search_cache_key(&params), b"{not json", Duration::from_secs(60))
            .await
            .unwrap();

        let service = SearchService::new(repo, Some(cache), Duration::from_secs(60));
        let result = service.search(params).await.unwrap();
        assert_eq!(result.total, 1);
    }

    #[tokio::test]
    async fn params_are_clamped_before_the_cache_key_is_derived() {
        let repo = seeded_repo();
        let service = SearchService::new(repo, None, Duration::from_secs(60));

        let result = service
            .search(SearchParams {
                page: 0,
                page_size: 10_000,
                ..SearchParams::default()
            })
            .await
            .unwrap();
        assert_eq!(result.page, 1);
        assert_eq!(result.page_size, 100);
    }

    #[test]
    fn cache_key_is_deterministic_and_complete() {
        let params = SearchParams {
            query: "rust async".into(),
            content_type: Some(ContentType::Article),
            sort_by: SortField::Relevance,
            sort_order: SortOrder::Asc,
            page: 2,
            page_size: 50,
        };
        assert_eq!(
            search_cache_key(&params),
            "search:rust async:article:2:50:relevance:asc"
        );
        assert_eq!(search_cache_key(&params), search_cache_key(&params.clone()));
    }
}
