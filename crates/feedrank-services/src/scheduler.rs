//! Periodic sync driver with cross-instance coordination.
//!
//! Each tick takes a distributed lock whose TTL equals the tick interval
//! (a cooldown, not a critical-section bound). A fully successful tick
//! leaves the lock to expire naturally, suppressing duplicate syncs from
//! other instances; a tick with any provider failure releases the lock
//! eagerly so another instance may retry within the same interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use feedrank_storage::DistributedLocker;

use crate::sync_service::SyncService;

/// Well-known lock key shared by every scheduler instance.
pub const SYNC_LOCK_KEY: &str = "sync:scheduler:lock";

/// Scheduler timing.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Tick interval; also the lock TTL.
    pub interval: Duration,
    /// Budget for one `sync_all` pass.
    pub timeout: Duration,
    /// Fire one tick immediately on start.
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            timeout: Duration::from_secs(30),
            run_on_startup: true,
        }
    }
}

struct Inner {
    sync: Arc<SyncService>,
    locker: Arc<dyn DistributedLocker>,
    config: SchedulerConfig,
}

/// Drives [`SyncService::sync_all`] on a fixed interval under the cooldown
/// lock. `start` spawns exactly one driver task; `stop` cancels it and
/// joins, cancelling any in-flight tick.
pub struct SyncScheduler {
    inner: Arc<Inner>,
    shutdown: watch::Sender<bool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(
        sync: Arc<SyncService>,
        locker: Arc<dyn DistributedLocker>,
        config: SchedulerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                sync,
                locker,
                config,
            }),
            shutdown,
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Spawns the driver task. Calling `start` twice replaces the handle but
    /// never spawns a second live driver; callers are expected to pair one
    /// `start` with one `stop`.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(
            interval_secs = inner.config.interval.as_secs(),
            run_on_startup = inner.config.run_on_startup,
            "starting sync scheduler"
        );

        let handle = tokio::spawn(async move {
            if inner.config.run_on_startup {
                inner.execute_tick(&mut shutdown).await;
            }

            let start = tokio::time::Instant::now() + inner.config.interval;
            let mut ticker = tokio::time::interval_at(start, inner.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => inner.execute_tick(&mut shutdown).await,
                }
            }
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
    }

    /// Cooperative shutdown: stops the ticker, cancels any in-flight tick,
    /// and joins the driver.
    pub async fn stop(&self) {
        tracing::info!("stopping sync scheduler");
        let _ = self.shutdown.send(true);

        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("sync scheduler stopped");
    }
}

impl Inner {
    async fn execute_tick(&self, shutdown: &mut watch::Receiver<bool>) {
        // Lock TTL equals the interval: holding it through the cooldown is
        // what suppresses the other instances' next tick.
        match self.locker.acquire(SYNC_LOCK_KEY, self.config.interval).await {
            Err(err) => {
                tracing::error!(key = SYNC_LOCK_KEY, error = %err, "failed to acquire distributed lock");
                return;
            }
            Ok(false) => {
                tracing::debug!(key = SYNC_LOCK_KEY, "another instance is running sync; skipping tick");
                return;
            }
            Ok(true) => {}
        }

        let results = tokio::select! {
            outcome = tokio::time::timeout(self.config.timeout, self.sync.sync_all()) => {
                match outcome {
                    Ok(results) => results,
                    Err(_) => {
                        tracing::warn!(
                            timeout_secs = self.config.timeout.as_secs(),
                            "sync tick timed out"
                        );
                        self.release_lock().await;
                        return;
                    }
                }
            }
            _ = shutdown.changed() => {
                tracing::debug!("scheduler shutting down; abandoning in-flight tick");
                self.release_lock().await;
                return;
            }
        };

        let synced: usize = results
            .iter()
            .filter(|r| r.error.is_none())
            .map(|r| r.count)
            .sum();
        let failed = results.iter().filter(|r| r.error.is_some()).count();

        for result in results.iter().filter(|r| r.error.is_some()) {
            tracing::warn!(
                provider = %result.provider,
                error = %result.error.as_ref().map(ToString::to_string).unwrap_or_default(),
                "provider sync failed"
            );
        }

        if failed > 0 {
            self.release_lock().await;
            tracing::info!(count = synced, failed, "sync completed with errors; lock released for retry");
        } else {
            tracing::info!(
                count = synced,
                cooldown_secs = self.config.interval.as_secs(),
                "sync completed; lock held for cooldown"
            );
        }
    }

    async fn release_lock(&self) {
        if let Err(err) = self.locker.release(SYNC_LOCK_KEY).await {
            tracing::error!(key = SYNC_LOCK_KEY, error = %err, "failed to release lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::{CountingProvider, FailingProvider};
    use feedrank_storage::{MemoryLocker, MemoryRepository};

    fn scheduler_pair(
        locker: Arc<MemoryLocker>,
        interval: Duration,
    ) -> (SyncScheduler, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider::new("counting"));
        let sync = Arc::new(SyncService::new(
            Arc::new(MemoryRepository::new()),
            vec![provider.clone()],
        ));
        let scheduler = SyncScheduler::new(
            sync,
            locker,
            SchedulerConfig {
                interval,
                timeout: Duration::from_secs(5),
                run_on_startup: true,
            },
        );
        (scheduler, provider)
    }

    #[tokio::test(start_paused = true)]
    async fn two_instances_share_one_tick_per_interval() {
        let locker = Arc::new(MemoryLocker::new());
        let interval = Duration::from_secs(100);

        let (a, provider_a) = scheduler_pair(locker.clone(), interval);
        let (b, provider_b) = scheduler_pair(locker.clone(), interval);

        a.start();
        b.start();

        // Startup tick plus two interval ticks over ~2.5 intervals.
        tokio::time::sleep(Duration::from_secs(250)).await;
        a.stop().await;
        b.stop().await;

        let total = provider_a.calls() + provider_b.calls();
        assert_eq!(total, 3, "cooldown lock must suppress duplicate ticks");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sync_releases_the_lock_for_retry() {
        let locker = Arc::new(MemoryLocker::new());
        let provider = Arc::new(FailingProvider::new("broken"));
        let sync = Arc::new(SyncService::new(
            Arc::new(MemoryRepository::new()),
            vec![provider],
        ));
        let scheduler = SyncScheduler::new(
            sync,
            locker.clone(),
            SchedulerConfig {
                interval: Duration::from_secs(100),
                timeout: Duration::from_secs(5),
                run_on_startup: true,
            },
        );

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        // The startup tick failed, so the cooldown lock must be gone well
        // before its TTL.
        assert!(!locker.is_held(SYNC_LOCK_KEY).await);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn successful_sync_keeps_the_lock_through_the_cooldown() {
        let locker = Arc::new(MemoryLocker::new());
        let (scheduler, provider) = scheduler_pair(locker.clone(), Duration::from_secs(100));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(provider.calls(), 1);
        assert!(locker.is_held(SYNC_LOCK_KEY).await);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks() {
        let locker = Arc::new(MemoryLocker::new());
        let (scheduler, provider) = scheduler_pair(locker.clone(), Duration::from_secs(50));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(10)).await;
        scheduler.stop().await;

        let after_stop = provider.calls();
        tokio::time::sleep(Duration::from_secs(500)).await;
        assert_eq!(provider.calls(), after_stop);
    }
}
