//! Ordered, embedded schema migrations.
//!
//! Each migration is a list of statements applied inside one transaction and
//! recorded in `schema_migrations`; re-running is a no-op.

use sqlx::{PgPool, Postgres, Transaction};

use crate::StorageError;

struct Migration {
    id: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: "001_create_contents",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS contents (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                provider_id VARCHAR(50) NOT NULL,
                external_id VARCHAR(100) NOT NULL,
                title VARCHAR(500) NOT NULL,
                type VARCHAR(20) NOT NULL,
                tags TEXT[] NOT NULL DEFAULT '{}',

                views BIGINT NOT NULL DEFAULT 0,
                likes BIGINT NOT NULL DEFAULT 0,
                duration VARCHAR(20) NOT NULL DEFAULT '',
                reading_time BIGINT NOT NULL DEFAULT 0,
                reactions BIGINT NOT NULL DEFAULT 0,
                comments BIGINT NOT NULL DEFAULT 0,

                score DOUBLE PRECISION NOT NULL DEFAULT 0,

                published_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

                CONSTRAINT uq_provider_external UNIQUE (provider_id, external_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_contents_type ON contents (type)",
            "CREATE INDEX IF NOT EXISTS idx_contents_score ON contents (score DESC)",
            "CREATE INDEX IF NOT EXISTS idx_contents_published_at ON contents (published_at DESC)",
            "CREATE INDEX IF NOT EXISTS idx_contents_provider_id ON contents (provider_id)",
        ],
    },
    Migration {
        id: "002_fts_and_ranking",
        statements: &[
            "ALTER TABLE contents ADD COLUMN IF NOT EXISTS search_vector tsvector",
            "CREATE INDEX IF NOT EXISTS idx_contents_search_vector ON contents USING GIN (search_vector)",
            r#"
            CREATE OR REPLACE FUNCTION contents_search_vector_update()
            RETURNS trigger AS $$
            BEGIN
                NEW.search_vector :=
                    setweight(to_tsvector('english', coalesce(NEW.title, '')), 'A') ||
                    setweight(to_tsvector('english', coalesce(array_to_string(NEW.tags, ' '), '')), 'B');
                RETURN NEW;
            END
            $$ LANGUAGE plpgsql
            "#,
            "DROP TRIGGER IF EXISTS trg_contents_search_vector ON contents",
            r#"
            CREATE TRIGGER trg_contents_search_vector
            BEFORE INSERT OR UPDATE OF title, tags
            ON contents
            FOR EACH ROW
            EXECUTE FUNCTION contents_search_vector_update()
            "#,
            r#"
            UPDATE contents SET search_vector =
                setweight(to_tsvector('english', coalesce(title, '')), 'A') ||
                setweight(to_tsvector('english', coalesce(array_to_string(tags, ' '), '')), 'B')
            WHERE search_vector IS NULL
            "#,
            // log10(score + 10): compresses popularity tails and gives
            // new content (score = 0) a multiplier of exactly 1.
            r#"
            ALTER TABLE contents ADD COLUMN IF NOT EXISTS log_score_cached
                DOUBLE PRECISION GENERATED ALWAYS AS (log(score + 10.0)) STORED
            "#,
            "CREATE INDEX IF NOT EXISTS idx_contents_log_score ON contents (log_score_cached DESC)",
        ],
    },
];

/// Applies every pending migration, in order.
pub async fn run(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|source| StorageError::query("creating schema_migrations", source))?;

    for migration in MIGRATIONS {
        let applied: Option<(String,)> =
            sqlx::query_as("SELECT id FROM schema_migrations WHERE id = $1")
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .map_err(|source| StorageError::query("checking applied migrations", source))?;
        if applied.is_some() {
            continue;
        }

        let mut tx: Transaction<'_, Postgres> = pool
            .begin()
            .await
            .map_err(|source| StorageError::Migration {
                id: migration.id,
                source,
            })?;

        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|source| StorageError::Migration {
                    id: migration.id,
                    source,
                })?;
        }

        sqlx::query("INSERT INTO schema_migrations (id) VALUES ($1)")
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .map_err(|source| StorageError::Migration {
                id: migration.id,
                source,
            })?;

        tx.commit().await.map_err(|source| StorageError::Migration {
            id: migration.id,
            source,
        })?;

        tracing::info!(id = migration.id, "applied migration");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_ids_are_unique_and_ordered() {
        let ids: Vec<_> = MIGRATIONS.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn every_migration_has_statements() {
        for migration in MIGRATIONS {
            assert!(!migration.statements.is_empty(), "{}", migration.id);
        }
    }
}
