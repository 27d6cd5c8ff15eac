//! Local-network server discovery
//!
//! Finds data servers on the local subnet without knowing their address,
//! and keeps the list of known servers honest over time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               DiscoveryEngine                │
//! │  CandidateSpace (lazy, N x /24 x port)       │
//! │        │                                     │
//! │        ▼                                     │
//! │  Probe x max_concurrent_probes ──► upsert ───┼──► ServerRegistry
//! └──────────────────────────────────────────────┘        ▲
//! ┌──────────────────────────────────────────────┐        │
//! │  HealthMonitor: every 30s re-probe known ────┼────────┘
//! │  addresses (skipped while a sweep runs)      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use expense_sync::discovery::{DiscoveryConfig, DiscoveryEngine, ServerRegistry};
//!
//! let registry = Arc::new(ServerRegistry::new());
//! let engine = DiscoveryEngine::from_config(&DiscoveryConfig::default(), registry.clone())?;
//! let report = engine.scan().await?;
//! for server in registry.online().await {
//!     println!("{} ({})", server.display_name, server.address);
//! }
//! ```

pub mod candidates;
pub mod health;
pub mod prober;
pub mod registry;
pub mod scanner;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::DEFAULT_PORT;
use crate::models::APP_SIGNATURE;

pub use candidates::CandidateSpace;
pub use health::{HealthMonitor, HealthReport};
pub use prober::{HttpProber, Probe, ProbeOutcome};
pub use registry::{RegistryEvent, RegistryStats, ServerRecord, ServerRegistry, ServerStatus};
pub use scanner::{DiscoveryEngine, ScanReport};

// ============================================================================
// Configuration
// ============================================================================

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Port servers listen on
    pub port: u16,

    /// /24 prefixes to sweep; empty means the built-in defaults
    pub prefixes: Vec<String>,

    /// Upper bound on simultaneously in-flight probes
    pub max_concurrent_probes: usize,

    /// Probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Health monitor interval in seconds
    pub health_interval_secs: u64,

    /// Signature a server must report to count as compatible
    pub app_name: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            prefixes: Vec::new(),
            max_concurrent_probes: 32,
            probe_timeout_secs: 5,
            health_interval_secs: 30,
            app_name: APP_SIGNATURE.to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.max_concurrent_probes == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "max_concurrent_probes must be greater than 0".to_string(),
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "probe_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.health_interval_secs == 0 {
            return Err(DiscoveryError::InvalidConfig(
                "health_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(DiscoveryError::InvalidConfig("port must not be 0".to_string()));
        }
        Ok(())
    }

    /// Probe timeout as Duration
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Health interval as Duration
    #[must_use]
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    /// Candidate space described by this configuration
    pub fn candidate_space(&self) -> Result<CandidateSpace, DiscoveryError> {
        if self.prefixes.is_empty() {
            Ok(CandidateSpace::default_for_port(self.port))
        } else {
            CandidateSpace::from_prefix_strs(&self.prefixes, self.port)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Discovery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// A scan is already running
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// Nothing to scan
    #[error("Candidate space is empty")]
    EmptySearchSpace,

    /// Unparseable subnet prefix
    #[error("Invalid subnet prefix: {0}")]
    InvalidPrefix(String),

    /// Invalid configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),

    /// Prober could not be created
    #[error("Prober initialization failed: {0}")]
    ProberInit(String),
}
