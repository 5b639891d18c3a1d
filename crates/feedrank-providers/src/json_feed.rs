//! Adapter for the JSON content feed.
//!
//! Expects `{"contents": [...], "pagination": {...}}` where each item carries
//! provider-local field names. Unknown fields are ignored; a malformed
//! `published_at` degrades to the zero time instead of failing the batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use feedrank_core::{calculate_score, clamp_title, Content, ContentType};

use crate::breaker::CircuitBreaker;
use crate::client::{build_client, get_with_retry};
use crate::retry::RetryPolicy;
use crate::{ClientConfig, Provider, ProviderError};

pub const PROVIDER_NAME: &str = "json_feed";

const CONTENTS_ENDPOINT: &str = "/api/contents";
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    contents: Vec<FeedItem>,
    #[serde(default)]
    #[allow(dead_code)]
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default, rename = "type")]
    item_type: String,
    #[serde(default)]
    metrics: Metrics,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Metrics {
    #[serde(default)]
    views: i64,
    #[serde(default)]
    likes: i64,
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
#[allow(dead_code)]
struct Pagination {
    #[serde(default)]
    total: i64,
    #[serde(default)]
    page: i64,
    #[serde(default)]
    per_page: i64,
}

impl FeedItem {
    fn into_content(self) -> Content {
        let published_at = parse_rfc3339_or_zero(&self.published_at);
        let mut content = Content {
            provider_id: PROVIDER_NAME.to_string(),
            external_id: self.id,
            title: clamp_title(&self.title),
            content_type: ContentType::parse(&self.item_type),
            tags: self.tags,
            views: self.metrics.views,
            likes: self.metrics.likes,
            duration: self.metrics.duration,
            published_at,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Content::default()
        };
        content.score = calculate_score(&content);
        content
    }
}

fn parse_rfc3339_or_zero(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Client for the JSON feed provider.
pub struct JsonFeedProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl JsonFeedProvider {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            breaker: CircuitBreaker::new(PROVIDER_NAME, config.breaker),
        })
    }

    fn parse_payload(&self, body: &[u8]) -> Result<Vec<Content>, ProviderError> {
        let feed: FeedResponse =
            serde_json::from_slice(body).map_err(|err| ProviderError::Decode {
                provider: PROVIDER_NAME,
                detail: err.to_string(),
            })?;

        Ok(feed
            .contents
            .into_iter()
            .map(FeedItem::into_content)
            .collect())
    }
}

#[async_trait]
impl Provider for JsonFeedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<Content>, ProviderError> {
        let url = format!("{}{CONTENTS_ENDPOINT}", self.base_url);

        let result = self
            .breaker
            .call(async {
                let body = get_with_retry(&self.client, &url, None, &self.retry).await?;
                self.parse_payload(&body)
            })
            .await;

        match result {
            Ok(contents) => {
                tracing::info!(
                    provider = PROVIDER_NAME,
                    count = contents.len(),
                    "fetch completed"
                );
                Ok(contents)
            }
            Err(err) => {
                tracing::warn!(
                    provider = PROVIDER_NAME,
                    state = self.breaker.state().as_str(),
                    error = %err,
                    "fetch failed"
                );
                Err(err)
            }
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let url = format!("{}{HEALTH_ENDPOINT}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                attempts: 1,
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::Status {
                status: response.status().as_u16(),
                url,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> JsonFeedProvider {
        JsonFeedProvider::new(ClientConfig {
            base_url: "http://feed.test".into(),
            ..ClientConfig::default()
        })
        .unwrap()
    }

    const FIXTURE: &str = r#"{
        "contents": [
            {
                "id": "vid-001",
                "title": "Async Rust deep dive",
                "type": "video",
                "metrics": {"views": 100000, "likes": 10000, "duration": "15:30"},
                "published_at": "2026-07-30T10:00:00Z",
                "tags": ["rust", "async"],
                "internal_rank": 7
            },
            {
                "id": "vid-002",
                "title": "Broken clock",
                "type": "video",
                "metrics": {"views": 10, "likes": 1, "duration": "0:45"},
                "published_at": "not-a-date",
                "tags": []
            }
        ],
        "pagination": {"total": 2, "page": 1, "per_page": 50}
    }"#;

    #[test]
    fn parses_items_into_scored_contents() {
        let contents = provider().parse_payload(FIXTURE.as_bytes()).unwrap();
        assert_eq!(contents.len(), 2);

        let first = &contents[0];
        assert_eq!(first.provider_id, "json_feed");
        assert_eq!(first.external_id, "vid-001");
        assert_eq!(first.title, "Async Rust deep dive");
        assert_eq!(first.content_type, ContentType::Video);
        assert_eq!(first.views, 100_000);
        assert_eq!(first.likes, 10_000);
        assert_eq!(first.duration, "15:30");
        assert_eq!(first.tags, vec!["rust", "async"]);
        assert!(first.score > 0.0);
        assert_eq!(
            first.published_at,
            "2026-07-30T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn malformed_date_becomes_zero_time_without_failing_the_batch() {
        let contents = provider().parse_payload(FIXTURE.as_bytes()).unwrap();
        assert_eq!(contents[1].published_at, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn unknown_item_type_is_tolerated() {
        let body = r#"{"contents": [{"id": "x", "title": "t", "type": "podcast"}]}"#;
        let contents = provider().parse_payload(body.as_bytes()).unwrap();
        assert_eq!(contents[0].content_type, ContentType::Unknown);
    }

    #[test]
    fn long_titles_are_clamped() {
        let title = "a".repeat(700);
        let body = format!(r#"{{"contents": [{{"id": "x", "title": "{title}", "type": "video"}}]}}"#);
        let contents = provider().parse_payload(body.as_bytes()).unwrap();
        assert_eq!(contents[0].title.chars().count(), 500);
    }

    #[test]
    fn whole_payload_decode_failure_aborts_the_fetch() {
        let err = provider().parse_payload(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Decode { provider: "json_feed", .. }));
    }

    #[test]
    fn empty_feed_yields_empty_batch() {
        let contents = provider().parse_payload(b"{}").unwrap();
        assert!(contents.is_empty());
    }
}
