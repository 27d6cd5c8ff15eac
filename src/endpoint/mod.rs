//! Data server endpoint
//!
//! Exposes the device's purchase data as a small read-only JSON API on the
//! local network. Every response is computed from the [`DataProvider`]
//! at request time.
//!
//! ```text
//! GET /api/status          liveness + identity (used by discovery)
//! GET /api/items           full record list
//! GET /api/stats           scalar aggregates
//! GET /api/products        per-product aggregates
//! GET /api/establishments  per-establishment aggregates
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use expense_sync::endpoint::{ServerConfig, SyncServer};
//! use expense_sync::provider::SqliteProvider;
//!
//! let provider = Arc::new(SqliteProvider::open("data/store.db")?);
//! let server = SyncServer::new(ServerConfig::default(), provider)?;
//! server.start().await?;
//! ```
//!
//! [`DataProvider`]: crate::provider::DataProvider

pub mod api;
pub mod config;
pub mod server;

pub use config::{ConfigError, ServerConfig, DEFAULT_PORT};
pub use server::{AppState, ServerError, ServerInfo, SyncServer};
