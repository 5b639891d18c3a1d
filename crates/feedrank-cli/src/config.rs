//! Process configuration.
//!
//! A single flat configuration value with explicit nested groups, loaded
//! with precedence env > YAML file > built-in defaults. Every recognised
//! environment variable is applied explicitly; no reflection-driven binding.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use feedrank_providers::{BreakerConfig, ClientConfig, RetryPolicy};
use feedrank_services::SchedulerConfig;
use feedrank_storage::{DatabaseConfig, RedisConfig};

const ENV_PREFIX: &str = "APP";
const DEFAULT_CONFIG_PATHS: &[&str] = &["config.yaml", "config/config.yaml"];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub cache: CacheSettings,
    pub provider: ProviderGroup,
    pub sync: SyncSettings,
    pub logger: LoggerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: "app".into(),
            password: "secret".into(),
            name: "feedrank".into(),
            ssl_mode: "disable".into(),
            max_open_conns: 25,
            max_idle_conns: 5,
            max_lifetime_secs: 300,
        }
    }
}

impl DatabaseSettings {
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.name.clone(),
            ssl_mode: self.ssl_mode.clone(),
            max_connections: self.max_open_conns,
            min_connections: self.max_idle_conns,
            max_lifetime: Duration::from_secs(self.max_lifetime_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisSettings {
    pub fn to_redis_config(&self) -> RedisConfig {
        RedisConfig {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            db: self.db,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub key_prefix: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 900,
            key_prefix: "feedrank".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderGroup {
    pub json_feed: ProviderSettings,
    pub xml_feed: ProviderSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".into(),
            timeout_secs: 10,
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
        }
    }
}

impl ProviderSettings {
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                wait_time: Duration::from_millis(self.retry.wait_time_ms),
                max_wait_time: Duration::from_millis(self.retry.max_wait_time_ms),
            },
            breaker: BreakerConfig {
                max_requests: self.breaker.max_requests,
                interval: Duration::from_secs(self.breaker.interval_secs),
                timeout: Duration::from_secs(self.breaker.timeout_secs),
                failure_ratio: self.breaker.failure_ratio,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub wait_time_ms: u64,
    pub max_wait_time_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_time_ms: 1_000,
            max_wait_time_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub max_requests: u32,
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub failure_ratio: f64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval_secs: 60,
            timeout_secs: 30,
            failure_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub interval_secs: u64,
    pub on_startup: bool,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            on_startup: true,
            timeout_secs: 30,
            batch_size: 100,
        }
    }
}

impl SyncSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.interval_secs),
            timeout: Duration::from_secs(self.timeout_secs),
            run_on_startup: self.on_startup,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// debug, info, warn, error
    pub level: String,
    /// json or text
    pub format: String,
    /// stdout or stderr
    pub output: String,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
            output: "stdout".into(),
        }
    }
}

impl Config {
    /// Loads configuration: built-in defaults, overlaid by the YAML file
    /// (explicit path must exist; default paths are optional), overlaid by
    /// `APP_*` environment variables.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                serde_yaml::from_str(&text)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => {
                let mut config = Config::default();
                for candidate in DEFAULT_CONFIG_PATHS {
                    let candidate = Path::new(candidate);
                    if candidate.exists() {
                        let text = std::fs::read_to_string(candidate)
                            .with_context(|| format!("reading {}", candidate.display()))?;
                        config = serde_yaml::from_str(&text)
                            .with_context(|| format!("parsing {}", candidate.display()))?;
                        break;
                    }
                }
                config
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        env_override("PORT", &mut self.app.port);

        env_override_string("DATABASE_HOST", &mut self.database.host);
        env_override("DATABASE_PORT", &mut self.database.port);
        env_override_string("DATABASE_USER", &mut self.database.user);
        env_override_string("DATABASE_PASSWORD", &mut self.database.password);
        env_override_string("DATABASE_NAME", &mut self.database.name);
        env_override_string("DATABASE_SSL_MODE", &mut self.database.ssl_mode);
        env_override("DATABASE_MAX_OPEN_CONNS", &mut self.database.max_open_conns);
        env_override("DATABASE_MAX_IDLE_CONNS", &mut self.database.max_idle_conns);
        env_override("DATABASE_MAX_LIFETIME_SECS", &mut self.database.max_lifetime_secs);

        env_override_string("REDIS_HOST", &mut self.redis.host);
        env_override("REDIS_PORT", &mut self.redis.port);
        env_override_string("REDIS_PASSWORD", &mut self.redis.password);
        env_override("REDIS_DB", &mut self.redis.db);

        env_override("CACHE_ENABLED", &mut self.cache.enabled);
        env_override("CACHE_TTL_SECS", &mut self.cache.ttl_secs);
        env_override_string("CACHE_KEY_PREFIX", &mut self.cache.key_prefix);

        apply_provider_env("PROVIDER_JSON_FEED", &mut self.provider.json_feed);
        apply_provider_env("PROVIDER_XML_FEED", &mut self.provider.xml_feed);

        env_override("SYNC_INTERVAL_SECS", &mut self.sync.interval_secs);
        env_override("SYNC_ON_STARTUP", &mut self.sync.on_startup);
        env_override("SYNC_TIMEOUT_SECS", &mut self.sync.timeout_secs);
        env_override("SYNC_BATCH_SIZE", &mut self.sync.batch_size);

        env_override_string("LOGGER_LEVEL", &mut self.logger.level);
        env_override_string("LOGGER_FORMAT", &mut self.logger.format);
        env_override_string("LOGGER_OUTPUT", &mut self.logger.output);
    }
}

fn apply_provider_env(prefix: &str, settings: &mut ProviderSettings) {
    env_override_string(&format!("{prefix}_BASE_URL"), &mut settings.base_url);
    env_override(&format!("{prefix}_TIMEOUT_SECS"), &mut settings.timeout_secs);
    env_override(
        &format!("{prefix}_RETRY_MAX_ATTEMPTS"),
        &mut settings.retry.max_attempts,
    );
    env_override(
        &format!("{prefix}_RETRY_WAIT_TIME_MS"),
        &mut settings.retry.wait_time_ms,
    );
    env_override(
        &format!("{prefix}_RETRY_MAX_WAIT_TIME_MS"),
        &mut settings.retry.max_wait_time_ms,
    );
    env_override(
        &format!("{prefix}_BREAKER_MAX_REQUESTS"),
        &mut settings.breaker.max_requests,
    );
    env_override(
        &format!("{prefix}_BREAKER_INTERVAL_SECS"),
        &mut settings.breaker.interval_secs,
    );
    env_override(
        &format!("{prefix}_BREAKER_TIMEOUT_SECS"),
        &mut settings.breaker.timeout_secs,
    );
    env_override(
        &format!("{prefix}_BREAKER_FAILURE_RATIO"),
        &mut settings.breaker.failure_ratio,
    );
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}_{key}")).ok()
}

fn env_override_string(key: &str, target: &mut String) {
    if let Some(value) = env_var(key) {
        *target = value;
    }
}

/// Parses the variable into `target`; unparseable values are ignored so a
/// typo degrades to the configured value rather than a crash.
fn env_override<T: FromStr>(key: &str, target: &mut T) {
    if let Some(value) = env_var(key) {
        if let Ok(parsed) = value.parse::<T>() {
            *target = parsed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = Config::default();
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.database.max_open_conns, 25);
        assert_eq!(config.cache.ttl_secs, 900);
        assert!(!config.cache.enabled);
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.provider.json_feed.retry.max_attempts, 3);
        assert_eq!(config.provider.xml_feed.breaker.failure_ratio, 0.5);
        assert_eq!(config.logger.level, "info");
    }

    #[test]
    fn yaml_overlays_defaults() {
        let yaml = r#"
app:
  port: 9000
cache:
  enabled: true
  ttl_secs: 60
provider:
  xml_feed:
    base_url: http://feeds.example.com
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.app.port, 9000);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.provider.xml_feed.base_url, "http://feeds.example.com");
        // Untouched groups keep their defaults.
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.provider.json_feed.timeout_secs, 10);
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = Config::default();
        std::env::set_var("APP_PORT", "7777");
        std::env::set_var("APP_CACHE_ENABLED", "true");
        std::env::set_var("APP_PROVIDER_JSON_FEED_BASE_URL", "http://json.env");
        std::env::set_var("APP_SYNC_BATCH_SIZE", "not-a-number");

        config.apply_env_overrides();

        std::env::remove_var("APP_PORT");
        std::env::remove_var("APP_CACHE_ENABLED");
        std::env::remove_var("APP_PROVIDER_JSON_FEED_BASE_URL");
        std::env::remove_var("APP_SYNC_BATCH_SIZE");

        assert_eq!(config.app.port, 7777);
        assert!(config.cache.enabled);
        assert_eq!(config.provider.json_feed.base_url, "http://json.env");
        // Unparseable values fall back to the configured default.
        assert_eq!(config.sync.batch_size, 100);
    }

    #[test]
    fn settings_convert_into_collaborator_configs() {
        let config = Config::default();
        let db = config.database.to_database_config();
        assert_eq!(db.max_lifetime, Duration::from_secs(300));

        let client = config.provider.json_feed.to_client_config();
        assert_eq!(client.retry.wait_time, Duration::from_millis(1_000));
        assert_eq!(client.breaker.timeout, Duration::from_secs(30));

        let scheduler = config.sync.to_scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(300));
        assert!(scheduler.run_on_startup);
    }
}
