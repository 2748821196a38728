//! Deploy Watcher - detects application rollouts from cluster metrics
//!
//! Periodically rebuilds each project's topology from its metrics cache,
//! records detected deployments with their post-rollout metrics and sends
//! deployment notifications.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use watcher_lib::{
    cache::FileCache,
    deployments::{DeploymentWatcherBuilder, LogNotifier},
    health::{components, HealthRegistry},
    observability::{StructuredLogger, WatcherMetrics},
    store::MemoryStore,
};

mod api;
mod config;

const WATCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting deploy-watcher");

    let config = config::WatcherSettings::load()?;
    info!(
        instance = %config.instance,
        projects = config.projects.len(),
        cache_dir = %config.cache_dir.display(),
        "Watcher configured"
    );

    // three missed ticks make the watcher unready
    let health_registry = HealthRegistry::with_stale_after(config.interval() * 3);
    health_registry.register(components::METRICS_CACHE).await;
    health_registry.register(components::STORE).await;
    health_registry.register(components::NOTIFIER).await;

    let metrics = WatcherMetrics::new();

    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(WATCHER_VERSION, config.interval_secs, config.projects.len());

    let store = match &config.store_path {
        Some(path) => MemoryStore::with_persistence(path.clone()).await?,
        None => MemoryStore::new(),
    };
    for project in &config.projects {
        store.upsert_project(project.clone()).await?;
    }
    let store = Arc::new(store);

    let watcher = DeploymentWatcherBuilder::new()
        .store(store.clone())
        .cache(Arc::new(FileCache::new(config.cache_dir.clone())))
        .notifier(Arc::new(LogNotifier))
        .interval(config.interval())
        .snapshot(config.snapshot_settings())
        .send_timeout(config.send_timeout())
        .health(health_registry.clone())
        .instance(config.instance.clone())
        .build()?;

    let app_state = Arc::new(api::AppState::new(health_registry, metrics, store));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let watcher_handle = tokio::spawn(async move { watcher.run(shutdown_rx).await });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    let _ = shutdown_tx.send(());
    watcher_handle.await?;
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}
