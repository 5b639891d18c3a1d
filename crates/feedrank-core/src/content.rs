//! Canonical content entity shared across providers and storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest title the store accepts; ingest truncates instead of rejecting.
pub const MAX_TITLE_LEN: usize = 500;

/// Kind of a content record, as reported by the provider feed.
///
/// Feeds occasionally ship types we do not know about; those are kept as
/// [`ContentType::Unknown`] rather than dropped, and score as neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Article,
    #[serde(other)]
    Unknown,
}

impl ContentType {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "video" => Self::Video,
            "article" => Self::Article,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Article => "article",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified content record from any provider.
///
/// Identified internally by `id` (assigned by the store on first upsert) and
/// externally by the natural key `(provider_id, external_id)`. Metric fields
/// are type-conditional: video rows carry `views`/`likes`/`duration`,
/// article rows carry `reading_time`/`reactions`/`comments`; the wrong-side
/// metrics stay zero and scoring ignores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: Uuid,
    pub provider_id: String,
    pub external_id: String,

    pub title: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub tags: Vec<String>,

    pub views: i64,
    pub likes: i64,
    pub duration: String,
    pub reading_time: i64,
    pub reactions: i64,
    pub comments: i64,

    /// Pre-computed popularity score, rounded to two decimals.
    pub score: f64,

    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Content {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            provider_id: String::new(),
            external_id: String::new(),
            title: String::new(),
            content_type: ContentType::Unknown,
            tags: Vec::new(),
            views: 0,
            likes: 0,
            duration: String::new(),
            reading_time: 0,
            reactions: 0,
            comments: 0,
            score: 0.0,
            published_at: DateTime::UNIX_EPOCH,
            created_at: DateTime::UNIX_EPOCH,
            updated_at: DateTime::UNIX_EPOCH,
        }
    }
}

impl Content {
    /// New record with the natural key set and timestamps at "now".
    /// The internal `id` stays nil until the store assigns one.
    #[must_use]
    pub fn new(
        provider_id: impl Into<String>,
        external_id: impl Into<String>,
        title: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        let now = Utc::now();
        Self {
            provider_id: provider_id.into(),
            external_id: external_id.into(),
            title: title.into(),
            content_type,
            published_at: now,
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_video(&self) -> bool {
        self.content_type == ContentType::Video
    }

    #[must_use]
    pub fn is_article(&self) -> bool {
        self.content_type == ContentType::Article
    }

    /// Likes-per-view ratio for videos. Zero for non-videos and zero views.
    #[must_use]
    pub fn engagement_rate(&self) -> f64 {
        if !self.is_video() || self.views == 0 {
            return 0.0;
        }
        self.likes as f64 / self.views as f64
    }

    /// Whole days elapsed since publication, clamped to zero for future
    /// timestamps. Days are counted as `floor(elapsed_hours / 24)`.
    #[must_use]
    pub fn days_since_published(&self) -> i64 {
        let days = (Utc::now() - self.published_at).num_hours() / 24;
        days.max(0)
    }
}

/// Truncates a title to [`MAX_TITLE_LEN`] characters on a char boundary.
#[must_use]
pub fn clamp_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_LEN {
        title.to_string()
    } else {
        title.chars().take(MAX_TITLE_LEN).collect()
    }
}
