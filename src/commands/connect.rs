use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use expense_sync::client::{ConnectionManager, ConnectionState, SynchronizedDataset};
use expense_sync::config::Config;
use expense_sync::discovery::{
    DiscoveryEngine, HealthMonitor, HttpProber, Probe, RegistryEvent, ServerRegistry,
};

const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(30);
const TOP_ENTRIES: usize = 5;

/// Connect to one server and print its dataset
pub async fn connect(config: Config, address: String, watch: bool) -> Result<()> {
    let manager = Arc::new(
        ConnectionManager::new(&config.client).context("Failed to create connection manager")?,
    );

    let dataset = manager
        .connect(&address)
        .await
        .with_context(|| format!("Failed to connect to {address}"))?;
    print_summary(&dataset);

    if !watch {
        return Ok(());
    }

    let every = config.client.auto_refresh().unwrap_or(DEFAULT_WATCH_INTERVAL);
    let refresher = manager.clone().start_auto_refresh(every);

    // Track the server in a registry so the health monitor can follow it
    let registry = Arc::new(ServerRegistry::new());
    let prober = HttpProber::with_timeout(config.discovery.probe_timeout(), config.discovery.app_name.clone())?;
    registry.apply_probe(&prober.probe(&dataset.address).await, true).await;

    let engine = Arc::new(DiscoveryEngine::from_config(&config.discovery, registry.clone())?);
    let monitor = Arc::new(HealthMonitor::new(engine, config.discovery.health_interval()));
    let health = monitor.start();

    println!("\nWatching {} every {}s. Press Ctrl+C to stop.", dataset.address, every.as_secs());

    let mut view = manager.subscribe();
    let mut events = registry.subscribe();
    let mut last_fetch = dataset.fetched_at;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if let Some(error) = &current.last_error {
                    println!("Refresh failed: {error} (showing data from {last_fetch})");
                } else if let Some(dataset) = current.dataset.filter(|d| d.fetched_at != last_fetch) {
                    last_fetch = dataset.fetched_at;
                    print_summary(&dataset);
                }
                if let ConnectionState::Failed(reason) = &current.state {
                    println!("Connection failed: {reason}");
                }
            }
            event = events.recv() => match event {
                Ok(RegistryEvent::StatusChanged { address, current, .. }) => {
                    println!("Server {address} is now {current}");
                }
                Ok(RegistryEvent::Discovered(_)) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    refresher.abort();
    health.abort();
    manager.disconnect().await;
    println!("Disconnected.");
    Ok(())
}

fn print_summary(dataset: &SynchronizedDataset) {
    let stats = &dataset.stats;

    println!();
    println!("Server {} (fetched {})", dataset.address, dataset.fetched_at.format("%Y-%m-%d %H:%M:%S"));
    println!("{:-<48}", "");
    println!("  Items: {}", stats.total_items);
    println!("  Total value: {:.2}", stats.total_value);
    println!("  Average item: {:.2}", stats.avg_item_value);
    println!("  Products: {}", stats.unique_products);
    println!("  Establishments: {}", stats.unique_establishments);

    if !dataset.products.is_empty() {
        println!("\n  Top products:");
        for product in dataset.products.iter().take(TOP_ENTRIES) {
            println!("    {:<28} {:>10.2} ({}x)", product.name, product.total_value, product.count);
        }
    }

    if !dataset.establishments.is_empty() {
        println!("\n  Top establishments:");
        for place in dataset.establishments.iter().take(TOP_ENTRIES) {
            println!("    {:<28} {:>10.2} ({}x)", place.name, place.total_value, place.count);
        }
    }
}
