use std::sync::Arc;

use tracing::{info, warn};
use upkeep_scheduler::SchedulerEngine;
use upkeep_store::MaintenanceStore;

mod config;

use config::{DatabaseConfig, UpkeepConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "upkeepd=info,upkeep_scheduler=info,upkeep_store=info".into()),
        )
        .init();

    // load config: explicit UPKEEP_CONFIG path > ~/.upkeep/upkeep.toml
    let config_path = std::env::var("UPKEEP_CONFIG").ok();
    let config = UpkeepConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        UpkeepConfig::default()
    });

    ensure_parent_dir(&config.database.path);
    info!(path = %config.database.path, "opening SQLite database");
    let conn = open_with_retry(&config.database).await?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    // schema migrations run inside the store constructor (idempotent)
    let store = Arc::new(MaintenanceStore::new(conn)?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine = SchedulerEngine::new(Arc::clone(&store), config.scheduler.tick_secs);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = engine_task.await;
    Ok(())
}

/// Open the database with bounded retry so a slow-to-mount data volume
/// does not kill the daemon on boot.
async fn open_with_retry(config: &DatabaseConfig) -> anyhow::Result<rusqlite::Connection> {
    let mut last_err = None;
    for attempt in 1..=config.connect_retries {
        match rusqlite::Connection::open(&config.path) {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    attempt,
                    max = config.connect_retries,
                    "database not ready: {e}"
                );
                last_err = Some(e);
                tokio::time::sleep(std::time::Duration::from_secs(config.retry_delay_secs)).await;
            }
        }
    }
    Err(anyhow::anyhow!(
        "could not open database after {} attempts: {}",
        config.connect_retries,
        last_err.map(|e| e.to_string()).unwrap_or_default()
    ))
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!(dir = %parent.display(), "could not create database directory: {e}");
        }
    }
}
