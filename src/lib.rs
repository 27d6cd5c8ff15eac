//! expense-sync - Local network data sync for an expense tracker
//!
//! One device serves its purchase records over plain HTTP; other devices on
//! the same network find it without configuration and pull a read-only copy.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`endpoint`] - HTTP server exposing records and aggregates
//! - [`provider`] - Record sources behind the endpoint (memory, SQLite)
//! - [`discovery`] - Subnet sweeps, server registry and health monitoring
//! - [`client`] - HTTP client and the single-connection manager
//! - [`models`] - Wire types shared by both sides
//! - [`config`] - Configuration management and settings
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use expense_sync::discovery::{DiscoveryConfig, DiscoveryEngine, ServerRegistry};
//! use expense_sync::client::{ClientConfig, ConnectionManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(ServerRegistry::new());
//!     let engine = DiscoveryEngine::from_config(&DiscoveryConfig::default(), registry.clone())?;
//!     engine.scan().await?;
//!
//!     let manager = ConnectionManager::new(&ClientConfig::default())?;
//!     if let Some(server) = registry.online().await.first() {
//!         let dataset = manager.connect_record(server).await?;
//!         println!("{} items from {}", dataset.items.len(), server.display_name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod models;
pub mod provider;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{ClientError, ConnectionManager, ConnectionState, SynchronizedDataset};
    pub use crate::config::Config;
    pub use crate::discovery::{DiscoveryEngine, HealthMonitor, ServerRecord, ServerRegistry, ServerStatus};
    pub use crate::endpoint::{ServerConfig, SyncServer};
    pub use crate::error::{Error, ErrorCategory, Result, SyncErrorTrait};
    pub use crate::models::{AggregateStats, PurchaseRecord};
    pub use crate::provider::{DataProvider, MemoryProvider, SqliteProvider};
}

// Direct re-exports for convenience
pub use models::{AggregateStats, PurchaseRecord, APP_SIGNATURE};
