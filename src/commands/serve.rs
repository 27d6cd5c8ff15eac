use anyhow::{Context, Result};
use std::sync::Arc;

use expense_sync::config::Config;
use expense_sync::endpoint::SyncServer;
use expense_sync::metrics;
use expense_sync::provider::SqliteProvider;

/// Start the data server over the configured SQLite store
pub async fn serve(config: Config) -> Result<()> {
    if config.server.enable_metrics {
        if let Err(e) = metrics::init_metrics() {
            tracing::warn!("Metrics initialization failed: {}", e);
        }
    }

    let path = &config.storage.sqlite_path;
    let provider = SqliteProvider::open(path)
        .with_context(|| format!("Failed to open record store: {}", path.display()))?;

    let server = SyncServer::new(config.server.clone(), Arc::new(provider))
        .context("Failed to create data server")?;

    println!("{}", server.info().display());
    println!("  Record Store: {}", path.display());
    println!();
    println!("Press Ctrl+C to stop.\n");

    server
        .start_with_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown signal received");
                }
                Err(e) => {
                    tracing::error!("Failed to wait for Ctrl+C: {}", e);
                }
            }
        })
        .await?;

    println!("Data server stopped.");
    Ok(())
}
