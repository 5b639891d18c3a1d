//! feedrank service binary: HTTP API, background sync, and one-shot
//! operational commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use feedrank_services::{SearchService, SyncScheduler, SyncService};
use feedrank_storage::{
    Cache, PgContentRepository, RedisCache, RedisLocker,
};
use feedrank_web::AppState;

mod config;
mod telemetry;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "feedrank")]
#[command(about = "Content aggregation and ranked search service")]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run migrations, start the scheduler, and serve the HTTP API.
    Serve,
    /// Run one sync pass across all providers and exit.
    Sync,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    telemetry::init(&config.logger)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Sync => sync_once(config).await,
        Commands::Migrate => migrate(config).await,
    }
}

async fn migrate(config: Config) -> anyhow::Result<()> {
    let pool = feedrank_storage::connect(&config.database.to_database_config())
        .await
        .context("opening database")?;
    feedrank_storage::migrations::run(&pool)
        .await
        .context("running migrations")?;
    tracing::info!("database migrations completed");
    pool.close().await;
    Ok(())
}

async fn sync_once(config: Config) -> anyhow::Result<()> {
    let pool = feedrank_storage::connect(&config.database.to_database_config())
        .await
        .context("opening database")?;
    feedrank_storage::migrations::run(&pool)
        .await
        .context("running migrations")?;

    let repo = Arc::new(
        PgContentRepository::new(pool.clone()).with_batch_size(config.sync.batch_size),
    );
    let providers = feedrank_providers::registry(
        config.provider.json_feed.to_client_config(),
        config.provider.xml_feed.to_client_config(),
    )?;
    let sync = SyncService::new(repo, providers);

    let results = sync.sync_all().await;
    for result in &results {
        match &result.error {
            None => println!(
                "{}: synced {} item(s) in {}ms",
                result.provider,
                result.count,
                result.duration.as_millis()
            ),
            Some(err) => println!("{}: failed: {err}", result.provider),
        }
    }

    pool.close().await;
    if results.iter().any(|r| r.error.is_some()) {
        anyhow::bail!("one or more providers failed to sync");
    }
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(port = config.app.port, "starting feedrank");

    let pool = feedrank_storage::connect(&config.database.to_database_config())
        .await
        .context("opening database")?;
    feedrank_storage::migrations::run(&pool)
        .await
        .context("running migrations")?;

    let redis = feedrank_storage::connect_redis(&config.redis.to_redis_config())
        .await
        .context("opening redis")?;

    let repo = Arc::new(
        PgContentRepository::new(pool.clone()).with_batch_size(config.sync.batch_size),
    );

    let cache: Option<Arc<dyn Cache>> = if config.cache.enabled {
        Some(Arc::new(RedisCache::new(
            redis.clone(),
            config.cache.key_prefix.clone(),
        )))
    } else {
        None
    };

    let providers = feedrank_providers::registry(
        config.provider.json_feed.to_client_config(),
        config.provider.xml_feed.to_client_config(),
    )?;

    let search = Arc::new(SearchService::new(
        repo.clone(),
        cache,
        Duration::from_secs(config.cache.ttl_secs),
    ));
    let sync = Arc::new(SyncService::new(repo, providers));

    let locker = Arc::new(RedisLocker::new(redis));
    let scheduler = SyncScheduler::new(sync.clone(), locker, config.sync.to_scheduler_config());
    scheduler.start();

    let state = AppState {
        search,
        sync,
        pool: pool.clone(),
    };
    feedrank_web::serve(state, config.app.port, shutdown_signal()).await?;

    scheduler.stop().await;
    pool.close().await;
    tracing::info!("feedrank stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
