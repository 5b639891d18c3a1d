//! Application services: the cache-aside search path, the provider sync
//! fan-out, and the lock-coordinated sync scheduler.

pub mod scheduler;
pub mod search_service;
pub mod sync_service;

pub use scheduler::{SchedulerConfig, SyncScheduler, SYNC_LOCK_KEY};
pub use search_service::SearchService;
pub use sync_service::{SyncError, SyncResult, SyncService};

pub const CRATE_NAME: &str = "feedrank-services";

#[cfg(test)]
mod support;
