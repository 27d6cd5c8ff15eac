use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use expense_sync::config::Config;
use expense_sync::discovery::{DiscoveryEngine, RegistryEvent, ServerRegistry};

/// Sweep the network, printing servers as they are found
pub async fn scan(config: Config) -> Result<()> {
    let registry = Arc::new(ServerRegistry::new());
    let engine = Arc::new(
        DiscoveryEngine::from_config(&config.discovery, registry.clone())
            .context("Failed to create discovery engine")?,
    );

    let space = engine.space();
    println!("Scanning {} addresses on port {}", space.len(), space.port());
    for [a, b, c] in space.prefixes() {
        println!("  {a}.{b}.{c}.0/24");
    }
    println!("Press Ctrl+C to stop early.\n");

    let mut events = registry.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(RegistryEvent::Discovered(server)) => {
                    println!(
                        "  found {:<22} {} (v{})",
                        server.address,
                        server.display_name,
                        server.app_version.as_deref().unwrap_or("?")
                    );
                }
                Ok(RegistryEvent::StatusChanged { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed registry events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let canceller = {
        let engine = engine.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine.cancel_scan();
            }
        })
    };

    let report = engine.scan().await?;
    canceller.abort();
    // Let the printer drain what is already queued
    tokio::task::yield_now().await;
    printer.abort();

    println!();
    println!(
        "Probed {} addresses in {:.1}s{}",
        report.probed,
        report.elapsed.as_secs_f64(),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    let servers = registry.online().await;
    if servers.is_empty() {
        println!("No servers found.");
    } else {
        println!("{} server(s) online:", servers.len());
        for server in servers {
            println!("  {:<22} {}", server.address, server.display_name);
        }
    }

    Ok(())
}
