//! Redis connection construction shared by the cache and the locker.

use redis::aio::ConnectionManager;

/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisConfig {
    #[must_use]
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }
}

/// Opens a managed connection that reconnects on failure. The manager is
/// cheap to clone; one handle is shared by the cache and the locker.
pub async fn connect_redis(config: &RedisConfig) -> redis::RedisResult<ConnectionManager> {
    let client = redis::Client::open(config.url())?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!(host = %config.host, port = config.port, "redis connection established");

    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_with_and_without_password() {
        let mut config = RedisConfig::default();
        assert_eq!(config.url(), "redis://localhost:6379/0");

        config.password = "hunter2".into();
        config.db = 3;
        assert_eq!(config.url(), "redis://:hunter2@localhost:6379/3");
    }
}
