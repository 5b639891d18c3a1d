//! Postgres pool construction.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::StorageError;

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "app".into(),
            password: "secret".into(),
            database: "feedrank".into(),
            ssl_mode: "disable".into(),
            max_connections: 25,
            min_connections: 5,
            max_lifetime: Duration::from_secs(300),
        }
    }
}

impl DatabaseConfig {
    /// Connection URL for sqlx.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// Opens the shared connection pool and verifies connectivity.
/// Statement caching is per-connection and on by default in sqlx.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .max_lifetime(config.max_lifetime)
        .connect(&config.url())
        .await
        .map_err(|source| StorageError::query("connecting to postgres", source))?;

    health_check(&pool).await?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        "database connection established"
    );

    Ok(pool)
}

/// Pings the database. Used by the readiness endpoint.
pub async fn health_check(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(|source| StorageError::query("pinging postgres", source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_includes_every_component() {
        let config = DatabaseConfig {
            host: "db.internal".into(),
            port: 5433,
            user: "svc".into(),
            password: "pw".into(),
            database: "contents".into(),
            ssl_mode: "require".into(),
            ..DatabaseConfig::default()
        };
        assert_eq!(
            config.url(),
            "postgres://svc:pw@db.internal:5433/contents?sslmode=require"
        );
    }
}
