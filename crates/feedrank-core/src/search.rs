//! Search parameters and paginated results.
//!
//! Parameter validation is a clamp, never a reject: out-of-range values are
//! corrected to defaults so the search path cannot fail on bad input.

use serde::{Deserialize, Serialize};

use crate::content::{Content, ContentType};

/// Longest free-text query accepted; longer input is truncated.
pub const MAX_QUERY_LEN: usize = 200;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Parses a sort order; anything unrecognised falls back to descending.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "asc" => Self::Asc,
            _ => Self::Desc,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    /// SQL direction keyword. Safe to interpolate: the value set is closed.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Field to sort search results by.
///
/// `Relevance` combines text rank with the cached log-score when a query is
/// present and degrades to `Score` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Relevance,
    Score,
    PublishedAt,
}

impl SortField {
    /// Parses a sort field; anything unrecognised is treated as `Score`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "relevance" => Self::Relevance,
            "published_at" => Self::PublishedAt,
            _ => Self::Score,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Score => "score",
            Self::PublishedAt => "published_at",
        }
    }
}

/// Search and filter parameters for content queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text query; empty means "no text filter".
    pub query: String,
    /// Exact content-type filter; `None` matches every type.
    pub content_type: Option<ContentType>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    /// 1-indexed page number.
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            content_type: None,
            sort_by: SortField::Score,
            sort_order: SortOrder::Desc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl SearchParams {
    /// Corrects out-of-range values to defaults. Bound correction, not
    /// validation: nothing here can fail.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        if self.query.chars().count() > MAX_QUERY_LEN {
            self.query = self.query.chars().take(MAX_QUERY_LEN).collect();
        }
        if self.page < 1 {
            self.page = 1;
        }
        if self.page_size < 1 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.page_size > MAX_PAGE_SIZE {
            self.page_size = MAX_PAGE_SIZE;
        }
        self
    }

    /// Row offset for pagination.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// Row limit for pagination.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

/// A page of search results plus pagination totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub contents: Vec<Content>,
    /// Total matching rows across all pages.
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl SearchResult {
    /// Builds a result page, deriving `total_pages = ceil(total / page_size)`.
    #[must_use]
    pub fn new(contents: Vec<Content>, total: i64, params: &SearchParams) -> Self {
        let page_size = i64::from(params.page_size.max(1));
        let total_pages = u32::try_from((total + page_size - 1) / page_size).unwrap_or(u32::MAX);

        Self {
            contents,
            total,
            page: params.page,
            page_size: params.page_size,
            total_pages,
        }
    }
}
