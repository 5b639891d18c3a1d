//! Request and response shapes for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use feedrank_core::{Content, ContentType, SearchParams, SearchResult, SortField, SortOrder};
use feedrank_services::SyncResult;

/// Query parameters for `GET /contents`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchQuery {
    /// Converts to domain params. When a free-text query is present and no
    /// explicit sort is requested, sorting switches to relevance; out-of-
    /// range values are left for the clamp downstream.
    pub fn into_params(self) -> SearchParams {
        let mut params = SearchParams::default();

        if let Some(q) = self.q {
            params.query = q;
        }
        params.content_type = self
            .content_type
            .as_deref()
            .and_then(|value| match value {
                "video" => Some(ContentType::Video),
                "article" => Some(ContentType::Article),
                _ => None,
            });

        match self.sort_by.as_deref() {
            Some(value) => params.sort_by = SortField::parse(value),
            None if !params.query.is_empty() => params.sort_by = SortField::Relevance,
            None => {}
        }
        if let Some(order) = self.sort_order.as_deref() {
            params.sort_order = SortOrder::parse(order);
        }
        if let Some(page) = self.page {
            params.page = page;
        }
        if let Some(page_size) = self.page_size {
            params.page_size = page_size;
        }

        params
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// A content record as served by the API. Type-irrelevant metric fields are
/// omitted when zero.
#[derive(Debug, Serialize)]
pub struct ContentDto {
    pub id: Uuid,
    pub provider_id: String,
    pub external_id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub views: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub likes: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub duration: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub reading_time: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub reactions: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub comments: i64,
    pub score: f64,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Content> for ContentDto {
    fn from(content: Content) -> Self {
        Self {
            id: content.id,
            provider_id: content.provider_id,
            external_id: content.external_id,
            title: content.title,
            content_type: content.content_type,
            tags: content.tags,
            views: content.views,
            likes: content.likes,
            duration: content.duration,
            reading_time: content.reading_time,
            reactions: content.reactions,
            comments: content.comments,
            score: content.score,
            published_at: content.published_at,
            created_at: content.created_at,
            updated_at: content.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaginationDto {
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub contents: Vec<ContentDto>,
    pub pagination: PaginationDto,
}

impl From<SearchResult> for SearchResponse {
    fn from(result: SearchResult) -> Self {
        Self {
            pagination: PaginationDto {
                total: result.total,
                page: result.page,
                page_size: result.page_size,
                total_pages: result.total_pages,
            },
            contents: result.contents.into_iter().map(ContentDto::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResultDto {
    pub provider: String,
    pub count: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&SyncResult> for SyncResultDto {
    fn from(result: &SyncResult) -> Self {
        Self {
            provider: result.provider.clone(),
            count: result.count,
            duration_ms: result.duration.as_millis() as u64,
            error: result.error.as_ref().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncSummaryDto {
    pub total_synced: usize,
    pub providers_failed: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub results: Vec<SyncResultDto>,
    pub summary: SyncSummaryDto,
}

impl SyncResponse {
    pub fn from_results(results: &[SyncResult]) -> Self {
        let total_synced = results
            .iter()
            .filter(|r| r.error.is_none())
            .map(|r| r.count)
            .sum();
        let providers_failed = results.iter().filter(|r| r.error.is_some()).count();
        Self {
            results: results.iter().map(SyncResultDto::from).collect(),
            summary: SyncSummaryDto {
                total_synced,
                providers_failed,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_smart_defaults_to_relevance_when_searching() {
        let params = SearchQuery {
            q: Some("rust".into()),
            ..SearchQuery::default()
        }
        .into_params();
        assert_eq!(params.sort_by, SortField::Relevance);

        let params = SearchQuery::default().into_params();
        assert_eq!(params.sort_by, SortField::Score);

        // An explicit sort wins over the smart default.
        let params = SearchQuery {
            q: Some("rust".into()),
            sort_by: Some("published_at".into()),
            ..SearchQuery::default()
        }
        .into_params();
        assert_eq!(params.sort_by, SortField::PublishedAt);
    }

    #[test]
    fn invalid_type_filter_is_dropped() {
        let params = SearchQuery {
            content_type: Some("podcast".into()),
            ..SearchQuery::default()
        }
        .into_params();
        assert_eq!(params.content_type, None);
    }

    #[test]
    fn zero_metrics_are_omitted_from_json() {
        let video = Content {
            id: Uuid::new_v4(),
            provider_id: "json_feed".into(),
            external_id: "v1".into(),
            title: "clip".into(),
            content_type: ContentType::Video,
            views: 100,
            likes: 10,
            duration: "2:00".into(),
            ..Content::default()
        };
        let json = serde_json::to_string(&ContentDto::from(video)).unwrap();
        assert!(json.contains("\"views\":100"));
        assert!(!json.contains("reading_time"));
        assert!(!json.contains("reactions"));
        assert!(!json.contains("comments"));
        assert!(!json.contains("\"tags\""));
    }
}
