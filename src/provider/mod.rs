//! Data Provider abstraction
//!
//! The server endpoint never owns purchase data; it reads it on every request
//! from a [`DataProvider`]. Two implementations ship with the crate:
//!
//! - [`MemoryProvider`] - records held in memory, mostly for tests and demos
//! - [`SqliteProvider`] - the on-device key/value store, backed by SQLite

pub mod aggregate;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::PurchaseRecord;

pub use aggregate::{aggregate_by, compute_stats, validate_records, AggregateKey, KeyAggregate};
pub use memory::MemoryProvider;
pub use sqlite::SqliteProvider;

/// Errors raised while reading from a data provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The backing store could not be read
    #[error("Storage read failed: {0}")]
    Read(String),

    /// A stored record could not be decoded or is not usable
    #[error("Malformed record {id}: {reason}")]
    Malformed { id: String, reason: String },

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Stored document is not valid JSON
    #[error("Invalid stored document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of purchase data for the server endpoint
///
/// Implementations must return either the complete record set or an error;
/// partial reads are not allowed.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// List every stored purchase record
    async fn list_records(&self) -> Result<Vec<PurchaseRecord>, ProviderError>;

    /// Compute per-key aggregates, sorted descending by total value
    async fn aggregate_by(&self, key: AggregateKey) -> Result<Vec<KeyAggregate>, ProviderError> {
        let records = self.list_records().await?;
        aggregate_by(&records, key)
    }
}
