//! Sync daemon entry-point: loads settings, wires the adapters, and runs the
//! scheduler until interrupted.

use std::sync::Arc;

use color_eyre::eyre::{Context, OptionExt, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use instance_sync::domain::{InstanceSyncService, SyncScheduler};
use instance_sync::outbound::cache::RedisInstanceCache;
use instance_sync::outbound::persistence::{DbPool, DieselInstanceStore};
use instance_sync::settings::SyncSettings;
use ortho_config::OrthoConfig;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = SyncSettings::load().wrap_err("failed to load sync settings")?;
    let database_url = settings
        .database_url()
        .ok_or_eyre("INSTANCE_SYNC_DATABASE_URL is not set")?;
    let redis_url = settings
        .redis_url()
        .ok_or_eyre("INSTANCE_SYNC_REDIS_URL is not set")?;

    let pool = DbPool::new(settings.pool_config(database_url))
        .await
        .wrap_err("failed to build database pool")?;
    let cache = RedisInstanceCache::connect(redis_url)
        .await
        .wrap_err("failed to connect to redis")?;

    let service = Arc::new(InstanceSyncService::new(
        Arc::new(DieselInstanceStore::new(pool)),
        Arc::new(cache),
        settings.sync_config(),
    ));
    let scheduler = SyncScheduler::new(service, settings.scheduler_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to listen for shutdown signal; running until killed");
            // Dropping the sender would stop the scheduler.
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        if shutdown_tx.send(true).is_err() {
            warn!("sync scheduler already stopped");
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
