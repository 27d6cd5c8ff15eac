use anyhow::{Context, Result};
use std::path::PathBuf;

use expense_sync::config::Config;
use expense_sync::models::PurchaseRecord;
use expense_sync::provider::{compute_stats, SqliteProvider};

/// Replace the stored records with the contents of a JSON file
pub async fn import(config: Config, input: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let records: Vec<PurchaseRecord> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of purchase records", input.display()))?;

    for record in &records {
        record
            .validate()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Record {} rejected", record.id))?;
    }

    let path = &config.storage.sqlite_path;
    let store = SqliteProvider::open(path)
        .with_context(|| format!("Failed to open record store: {}", path.display()))?;
    store.store_records(&records).await?;

    let stats = compute_stats(&records)?;
    tracing::info!(records = records.len(), db = %path.display(), "Import complete");

    println!("Imported {} records into {}", records.len(), path.display());
    println!("  Total value: {:.2}", stats.total_value);
    println!("  Products: {}", stats.unique_products);
    println!("  Establishments: {}", stats.unique_establishments);
    Ok(())
}
