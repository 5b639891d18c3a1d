//! Content repository over Postgres: ranked full-text search plus upserts
//! keyed by `(provider_id, external_id)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use feedrank_core::{Content, ContentType, SearchParams, SearchResult, SortField};

use crate::StorageError;

/// Rows per multi-value upsert statement.
pub const DEFAULT_UPSERT_BATCH: usize = 100;

const SELECT_COLUMNS: &str = "id, provider_id, external_id, title, type, tags, \
     views, likes, duration, reading_time, reactions, comments, \
     score, published_at, created_at, updated_at";

/// Persistence operations over content records.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Ranked, filtered, paginated search.
    async fn search(&self, params: SearchParams) -> Result<SearchResult, StorageError>;

    /// Lookup by internal id. `None` when absent; absence is not an error.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Content>, StorageError>;

    /// Lookup by the natural key.
    async fn get_by_provider_and_external_id(
        &self,
        provider_id: &str,
        external_id: &str,
    ) -> Result<Option<Content>, StorageError>;

    /// Insert-or-update by natural key; returns the stored row with its
    /// server-assigned `id`, `created_at`, and `updated_at`.
    async fn upsert(&self, content: &Content) -> Result<Content, StorageError>;

    /// Batched insert-or-update. Empty input is a no-op. Returns the number
    /// of rows written.
    async fn bulk_upsert(&self, contents: &[Content]) -> Result<u64, StorageError>;

    async fn delete(&self, id: Uuid) -> Result<(), StorageError>;

    /// Total rows matching the filters in `params` (pagination ignored).
    async fn count(&self, params: SearchParams) -> Result<i64, StorageError>;
}

/// Postgres-backed [`ContentRepository`].
#[derive(Debug, Clone)]
pub struct PgContentRepository {
    pool: PgPool,
    batch_size: usize,
}

impl PgContentRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_UPSERT_BATCH,
        }
    }

    /// Overrides the bulk-upsert batch size, clamped to `1..=100`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, DEFAULT_UPSERT_BATCH);
        self
    }

    async fn count_matching(&self, params: &SearchParams) -> Result<i64, StorageError> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM contents");
        push_filters(&mut builder, params);

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|source| StorageError::query("counting contents", source))?;
        row.try_get::<i64, _>(0)
            .map_err(|source| StorageError::query("counting contents", source))
    }
}

/// Appends the WHERE clause. The text predicate uses `websearch_to_tsquery`
/// so user-facing syntax (`a b`, `a OR b`, `-a`) works; both predicates are
/// bound parameters.
fn push_filters<'args>(builder: &mut QueryBuilder<'args, Postgres>, params: &'args SearchParams) {
    let mut prefix = " WHERE ";
    if !params.query.is_empty() {
        builder
            .push(prefix)
            .push("search_vector @@ websearch_to_tsquery('english', ")
            .push_bind(&params.query)
            .push(")");
        prefix = " AND ";
    }
    if let Some(content_type) = params.content_type {
        builder
            .push(prefix)
            .push("type = ")
            .push_bind(content_type.as_str());
    }
}

/// Appends the ORDER BY clause.
///
/// Relevance with a query ranks by `ts_rank * log_score_cached`: the
/// multiplication gives text relevance a veto (zero relevance means zero
/// rank regardless of popularity), while the cached `log10(score + 10)`
/// factor compresses tail variance and ranks equal-relevance rows by
/// popularity. Without a query, relevance degrades to the score ordering.
fn push_ordering<'args>(builder: &mut QueryBuilder<'args, Postgres>, params: &'args SearchParams) {
    let direction = params.sort_order.as_sql();
    match params.sort_by {
        SortField::Relevance if !params.query.is_empty() => {
            builder
                .push(" ORDER BY (ts_rank(search_vector, websearch_to_tsquery('english', ")
                .push_bind(&params.query)
                .push(")) * log_score_cached) ")
                .push(direction);
        }
        SortField::Relevance | SortField::Score => {
            builder.push(" ORDER BY score ").push(direction);
        }
        SortField::PublishedAt => {
            builder.push(" ORDER BY published_at ").push(direction);
        }
    }
}

fn row_to_content(row: &PgRow) -> Result<Content, sqlx::Error> {
    let content_type: String = row.try_get("type")?;
    Ok(Content {
        id: row.try_get("id")?,
        provider_id: row.try_get("provider_id")?,
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        content_type: ContentType::parse(&content_type),
        tags: row.try_get("tags")?,
        views: row.try_get("views")?,
        likes: row.try_get("likes")?,
        duration: row.try_get("duration")?,
        reading_time: row.try_get("reading_time")?,
        reactions: row.try_get("reactions")?,
        comments: row.try_get("comments")?,
        score: row.try_get("score")?,
        published_at: row.try_get("published_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn push_upsert_row(
    builder: &mut sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>,
    content: &Content,
    updated_at: DateTime<Utc>,
) {
    builder
        .push_bind(content.provider_id.clone())
        .push_bind(content.external_id.clone())
        .push_bind(content.title.clone())
        .push_bind(content.content_type.as_str())
        .push_bind(content.tags.clone())
        .push_bind(content.views)
        .push_bind(content.likes)
        .push_bind(content.duration.clone())
        .push_bind(content.reading_time)
        .push_bind(content.reactions)
        .push_bind(content.comments)
        .push_bind(content.score)
        .push_bind(content.published_at)
        .push_bind(updated_at);
}

const UPSERT_PREFIX: &str = "INSERT INTO contents \
     (provider_id, external_id, title, type, tags, views, likes, duration, \
      reading_time, reactions, comments, score, published_at, updated_at) ";

const UPSERT_CONFLICT: &str = " ON CONFLICT (provider_id, external_id) DO UPDATE SET \
     title = EXCLUDED.title, type = EXCLUDED.type, tags = EXCLUDED.tags, \
     views = EXCLUDED.views, likes = EXCLUDED.likes, duration = EXCLUDED.duration, \
     reading_time = EXCLUDED.reading_time, reactions = EXCLUDED.reactions, \
     comments = EXCLUDED.comments, score = EXCLUDED.score, \
     published_at = EXCLUDED.published_at, updated_at = EXCLUDED.updated_at";

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn search(&self, params: SearchParams) -> Result<SearchResult, StorageError> {
        let params = params.clamped();

        let total = self.count_matching(&params).await?;

        let mut builder = QueryBuilder::new(format!("SELECT {SELECT_COLUMNS} FROM contents"));
        push_filters(&mut builder, &params);
        push_ordering(&mut builder, &params);
        builder
            .push(" LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|source| StorageError::query("searching contents", source))?;

        let contents = rows
            .iter()
            .map(row_to_content)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StorageError::query("decoding content rows", source))?;

        Ok(SearchResult::new(contents, total, &params))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Content>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM contents WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| StorageError::query("getting content by id", source))?;

        row.as_ref()
            .map(row_to_content)
            .transpose()
            .map_err(|source| StorageError::query("decoding content row", source))
    }

    async fn get_by_provider_and_external_id(
        &self,
        provider_id: &str,
        external_id: &str,
    ) -> Result<Option<Content>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM contents WHERE provider_id = $1 AND external_id = $2"
        ))
        .bind(provider_id)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| StorageError::query("getting content by natural key", source))?;

        row.as_ref()
            .map(row_to_content)
            .transpose()
            .map_err(|source| StorageError::query("decoding content row", source))
    }

    async fn upsert(&self, content: &Content) -> Result<Content, StorageError> {
        let mut builder = QueryBuilder::new(UPSERT_PREFIX);
        let updated_at = Utc::now();
        builder.push_values([content], |mut row, content| {
            push_upsert_row(&mut row, content, updated_at);
        });
        builder.push(UPSERT_CONFLICT);
        builder.push(format!(" RETURNING {SELECT_COLUMNS}"));

        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|source| StorageError::query("upserting content", source))?;

        row_to_content(&row).map_err(|source| StorageError::query("decoding content row", source))
    }

    async fn bulk_upsert(&self, contents: &[Content]) -> Result<u64, StorageError> {
        if contents.is_empty() {
            return Ok(0);
        }

        let updated_at = Utc::now();
        let mut written = 0u64;

        for chunk in contents.chunks(self.batch_size) {
            let mut builder = QueryBuilder::new(UPSERT_PREFIX);
            builder.push_values(chunk, |mut row, content| {
                push_upsert_row(&mut row, content, updated_at);
            });
            builder.push(UPSERT_CONFLICT);

            let result = builder
                .build()
                .execute(&self.pool)
                .await
                .map_err(|source| StorageError::query("bulk upserting contents", source))?;
            written += result.rows_affected();
        }

        Ok(written)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM contents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|source| StorageError::query("deleting content", source))
    }

    async fn count(&self, params: SearchParams) -> Result<i64, StorageError> {
        self.count_matching(&params.clamped()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrank_core::SortOrder;

    fn sql_for(params: &SearchParams) -> String {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM contents");
        push_filters(&mut builder, params);
        builder.into_sql()
    }

    fn order_sql_for(params: &SearchParams) -> String {
        let mut builder = QueryBuilder::new("SELECT * FROM contents");
        push_ordering(&mut builder, params);
        builder.into_sql()
    }

    #[test]
    fn no_filters_means_no_where_clause() {
        let sql = sql_for(&SearchParams::default());
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn query_and_type_filters_are_bound_parameters() {
        let params = SearchParams {
            query: "go concurrency".into(),
            content_type: Some(ContentType::Video),
            ..SearchParams::default()
        };
        let sql = sql_for(&params);
        assert!(sql.contains("search_vector @@ websearch_to_tsquery('english', $1)"));
        assert!(sql.contains("type = $2"));
        assert!(!sql.contains("go concurrency"));
    }

    #[test]
    fn relevance_with_query_multiplies_rank_by_log_score() {
        let params = SearchParams {
            query: "rust".into(),
            sort_by: SortField::Relevance,
            ..SearchParams::default()
        };
        let sql = order_sql_for(&params);
        assert!(sql.contains(
            "ORDER BY (ts_rank(search_vector, websearch_to_tsquery('english', $1)) * log_score_cached) DESC"
        ));
    }

    #[test]
    fn relevance_without_query_degrades_to_score() {
        let params = SearchParams {
            sort_by: SortField::Relevance,
            ..SearchParams::default()
        };
        assert!(order_sql_for(&params).contains("ORDER BY score DESC"));
    }

    #[test]
    fn published_at_ordering_honours_direction() {
        let params = SearchParams {
            sort_by: SortField::PublishedAt,
            sort_order: SortOrder::Asc,
            ..SearchParams::default()
        };
        assert!(order_sql_for(&params).contains("ORDER BY published_at ASC"));
    }

    #[tokio::test]
    async fn batch_size_is_clamped() {
        let pool = PgPool::connect_lazy("postgres://u:p@localhost:1/db").unwrap();
        let repo = PgContentRepository::new(pool.clone()).with_batch_size(5_000);
        assert_eq!(repo.batch_size, DEFAULT_UPSERT_BATCH);
        let repo = PgContentRepository::new(pool).with_batch_size(0);
        assert_eq!(repo.batch_size, 1);
    }
}
