//! Client side of the sync protocol
//!
//! [`ApiClient`] speaks the five-resource HTTP API; [`ConnectionManager`]
//! builds on it to hold one synchronized dataset from a chosen server.
//!
//! # Usage
//!
//! ```ignore
//! use expense_sync::client::{ClientConfig, ConnectionManager};
//!
//! let manager = ConnectionManager::new(&ClientConfig::default())?;
//! let dataset = manager.connect("192.168.1.20").await?;
//! println!("{} items", dataset.items.len());
//! ```

pub mod api;
pub mod connection;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::DEFAULT_PORT;
use crate::models::APP_SIGNATURE;

pub use api::{
    normalize_address, normalize_default, ApiClient, ClientError, Resource, FETCH_TIMEOUT,
    PROBE_TIMEOUT,
};
pub use connection::{ConnectionManager, ConnectionState, ConnectionView, SynchronizedDataset};

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the connection manager
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Port applied to addresses entered without one
    pub port: u16,

    /// Status probe timeout in milliseconds
    pub probe_timeout_ms: u64,

    /// Resource fetch timeout in milliseconds
    pub fetch_timeout_ms: u64,

    /// Auto-refresh interval in milliseconds; 0 disables it
    pub auto_refresh_ms: u64,

    /// Signature a server must report
    pub app_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            probe_timeout_ms: duration_ms(PROBE_TIMEOUT),
            fetch_timeout_ms: duration_ms(FETCH_TIMEOUT),
            auto_refresh_ms: 0,
            app_name: APP_SIGNATURE.to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl ClientConfig {
    /// Set probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set auto-refresh interval
    pub fn with_auto_refresh(mut self, interval: Duration) -> Self {
        self.auto_refresh_ms = duration_ms(interval);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ClientConfigError> {
        if self.probe_timeout_ms == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "probe_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "fetch_timeout_ms".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.port == 0 {
            return Err(ClientConfigError::InvalidValue {
                field: "port".to_string(),
                reason: "must not be 0".to_string(),
            });
        }
        if self.app_name.trim().is_empty() {
            return Err(ClientConfigError::MissingField {
                field: "app_name".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Auto-refresh interval, if enabled
    #[must_use]
    pub fn auto_refresh(&self) -> Option<Duration> {
        (self.auto_refresh_ms > 0).then(|| Duration::from_millis(self.auto_refresh_ms))
    }
}

/// Client configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}
