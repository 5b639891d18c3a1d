//! Provider synchronisation: parallel fetch fan-out plus independent
//! per-provider bulk upserts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use feedrank_providers::{Provider, ProviderError};
use feedrank_storage::{ContentRepository, StorageError};

/// Why a provider's sync pass failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching from {provider}: {source}")]
    Fetch {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("storing {provider} batch: {source}")]
    Store {
        provider: String,
        #[source]
        source: StorageError,
    },

    #[error("sync task for {provider} aborted: {detail}")]
    Task { provider: String, detail: String },
}

impl SyncError {
    /// Breaker-open is a provider-unavailable condition, not a bug.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(
            self,
            Self::Fetch { source, .. } if source.is_circuit_open()
        )
    }
}

/// Outcome of one provider's sync pass.
#[derive(Debug)]
pub struct SyncResult {
    pub provider: String,
    pub count: usize,
    pub duration: Duration,
    pub error: Option<SyncError>,
}

/// Fans out across the provider registry and upserts each provider's batch
/// independently.
pub struct SyncService {
    repo: Arc<dyn ContentRepository>,
    providers: Vec<Arc<dyn Provider>>,
}

impl SyncService {
    pub fn new(repo: Arc<dyn ContentRepository>, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self { repo, providers }
    }

    /// Syncs every provider in parallel and waits for all of them. A
    /// provider-level failure is recorded in its slot and never aborts
    /// peers; results come back in registry order.
    pub async fn sync_all(&self) -> Vec<SyncResult> {
        tracing::info!(count = self.providers.len(), "starting sync from all providers");

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let repo = Arc::clone(&self.repo);
                let provider = Arc::clone(provider);
                tokio::spawn(async move { sync_one(repo, provider).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (provider, handle) in self.providers.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => results.push(SyncResult {
                    provider: provider.name().to_string(),
                    count: 0,
                    duration: Duration::ZERO,
                    error: Some(SyncError::Task {
                        provider: provider.name().to_string(),
                        detail: err.to_string(),
                    }),
                }),
            }
        }

        let synced: usize = results
            .iter()
            .filter(|r| r.error.is_none())
            .map(|r| r.count)
            .sum();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        tracing::info!(count = synced, failed, "sync completed");

        results
    }

    /// Syncs a single provider by name. `None` means the name is unknown.
    pub async fn sync_provider(&self, name: &str) -> Option<SyncResult> {
        let provider = self.providers.iter().find(|p| p.name() == name)?;
        Some(sync_one(Arc::clone(&self.repo), Arc::clone(provider)).await)
    }

    /// Provider names in registry order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

async fn sync_one(repo: Arc<dyn ContentRepository>, provider: Arc<dyn Provider>) -> SyncResult {
    let name = provider.name().to_string();
    let started = Instant::now();

    tracing::debug!(provider = %name, "syncing provider");

    let contents = match provider.fetch().await {
        Ok(contents) => contents,
        Err(source) => {
            if source.is_circuit_open() {
                tracing::warn!(provider = %name, "provider unavailable, circuit open");
            } else {
                tracing::warn!(provider = %name, error = %source, "provider fetch failed");
            }
            return SyncResult {
                provider: name.clone(),
                count: 0,
                duration: started.elapsed(),
                error: Some(SyncError::Fetch {
                    provider: name,
                    source,
                }),
            };
        }
    };

    if !contents.is_empty() {
        if let Err(source) = repo.bulk_upsert(&contents).await {
            tracing::error!(provider = %name, error = %source, "bulk upsert failed");
            return SyncResult {
                provider: name.clone(),
                count: 0,
                duration: started.elapsed(),
                error: Some(SyncError::Store {
                    provider: name,
                    source,
                }),
            };
        }
    }

    let duration = started.elapsed();
    tracing::info!(
        provider = %name,
        count = contents.len(),
        duration_ms = duration.as_millis() as u64,
        "provider sync completed"
    );

    SyncResult {
        provider: name,
        count: contents.len(),
        duration,
        error: None,
    }
}
