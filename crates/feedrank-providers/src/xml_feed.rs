//! Adapter for the XML content feed.
//!
//! Expects `<feed><items><item>...</item></items></feed>` with per-item
//! `<stats>` and `<categories>` blocks and `YYYY-MM-DD` publication dates.
//! Metrics are mapped type-conditionally: stats blocks carry both video and
//! article counters, and only the matching side is kept.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use feedrank_core::{calculate_score, clamp_title, Content, ContentType};

use crate::breaker::CircuitBreaker;
use crate::client::{build_client, get_with_retry};
use crate::retry::RetryPolicy;
use crate::{ClientConfig, Provider, ProviderError};

pub const PROVIDER_NAME: &str = "xml_feed";

const FEED_ENDPOINT: &str = "/feed";
const HEALTH_ENDPOINT: &str = "/health";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    items: Items,
}

#[derive(Debug, Default, Deserialize)]
struct Items {
    #[serde(default, rename = "item")]
    entries: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    id: String,
    #[serde(default)]
    headline: String,
    #[serde(default, rename = "type")]
    item_type: String,
    #[serde(default)]
    stats: Stats,
    #[serde(default)]
    publication_date: String,
    #[serde(default)]
    categories: Categories,
}

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default)]
    views: i64,
    #[serde(default)]
    likes: i64,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    reading_time: i64,
    #[serde(default)]
    reactions: i64,
    #[serde(default)]
    comments: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    #[serde(default, rename = "category")]
    entries: Vec<String>,
}

impl Item {
    fn into_content(self) -> Content {
        let content_type = ContentType::parse(&self.item_type);
        let mut content = Content {
            provider_id: PROVIDER_NAME.to_string(),
            external_id: self.id,
            title: clamp_title(&self.headline),
            content_type,
            tags: self.categories.entries,
            published_at: parse_date_or_zero(&self.publication_date),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ..Content::default()
        };

        match content_type {
            ContentType::Video => {
                content.views = self.stats.views;
                content.likes = self.stats.likes;
                content.duration = self.stats.duration;
            }
            ContentType::Article => {
                content.reading_time = self.stats.reading_time;
                content.reactions = self.stats.reactions;
                content.comments = self.stats.comments;
            }
            ContentType::Unknown => {}
        }

        content.score = calculate_score(&content);
        content
    }
}

fn parse_date_or_zero(value: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Client for the XML feed provider.
pub struct XmlFeedProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl XmlFeedProvider {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
            breaker: CircuitBreaker::new(PROVIDER_NAME, config.breaker),
        })
    }

    fn parse_payload(&self, body: &[u8]) -> Result<Vec<Content>, ProviderError> {
        let text = String::from_utf8_lossy(body);
        let feed: Feed = quick_xml::de::from_str(&text).map_err(|err| ProviderError::Decode {
            provider: PROVIDER_NAME,
            detail: err.to_string(),
        })?;

        Ok(feed
            .items
            .entries
            .into_iter()
            .map(Item::into_content)
            .collect())
    }
}

#[async_trait]
impl Provider for XmlFeedProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn fetch(&self) -> Result<Vec<Content>, ProviderError> {
        let url = format!("{}{FEED_ENDPOINT}", self.base_url);

        let result = self
            .breaker
            .call(async {
                let body =
                    get_with_retry(&self.client, &url, Some("application/xml"), &self.retry)
                        .await?;
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
