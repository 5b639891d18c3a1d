//! Provider feed adapters: fetch, decode, normalise, score.
//!
//! Each adapter owns an HTTP client with a transport-level retry policy and
//! wraps every fetch in a shared circuit breaker. Two adapters ship: one for
//! JSON feeds with pagination metadata, one for XML feeds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use feedrank_core::Content;

pub mod breaker;
mod client;
pub mod json_feed;
pub mod retry;
pub mod xml_feed;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use json_feed::JsonFeedProvider;
pub use retry::RetryPolicy;
pub use xml_feed::XmlFeedProvider;

pub const CRATE_NAME: &str = "feedrank-providers";

/// Errors surfaced by a provider fetch.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider's circuit breaker is open; no request was attempted.
    /// Callers treat this as "provider unavailable", not as a bug.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Transport failure that survived all retry attempts.
    #[error("request failed after {attempts} attempt(s): {source}")]
    Request {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Terminal non-2xx response (4xx immediately, 5xx after retries).
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// The payload could not be decoded into the feed shape.
    #[error("decoding {provider} payload: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },
}

impl ProviderError {
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen)
    }
}

/// Capability set implemented by every provider adapter.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider identifier, stored as `provider_id` on every record.
    fn name(&self) -> &str;

    /// Fetches the full feed, normalised into scored [`Content`] records.
    async fn fetch(&self) -> Result<Vec<Content>, ProviderError>;

    /// Verifies the provider endpoint is reachable. Bypasses the breaker.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Connection settings for a single provider adapter.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Builds the provider registry in its canonical order.
///
/// Iteration order is the injected order; result aggregation in the sync
/// layer reports providers in this order.
pub fn registry(
    json_feed: ClientConfig,
    xml_feed: ClientConfig,
) -> anyhow::Result<Vec<Arc<dyn Provider>>> {
    Ok(vec![
        Arc::new(JsonFeedProvider::new(json_feed)?),
        Arc::new(XmlFeedProvider::new(xml_feed)?),
    ])
}
