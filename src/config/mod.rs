//! Configuration management for expense-sync
//!
//! Settings are loaded from environment variables or a TOML file, then
//! overridden by command-line flags in the binary. Each section maps onto
//! the config type of the module it drives.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::discovery::DiscoveryConfig;
use crate::endpoint::ServerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server endpoint configuration
    pub server: ServerConfig,

    /// Record store configuration
    pub storage: StorageConfig,

    /// Discovery configuration
    pub discovery: DiscoveryConfig,

    /// Connection manager configuration
    pub client: ClientConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/expenses.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = env_parse::<SocketAddr>("EXPENSE_SYNC_BIND") {
            config.server.bind_address = bind;
        }
        if let Ok(name) = std::env::var("EXPENSE_SYNC_DEVICE_NAME") {
            config.server.device_name = Some(name).filter(|n| !n.trim().is_empty());
        }
        if let Some(cors) = env_bool("EXPENSE_SYNC_ENABLE_CORS") {
            config.server.enable_cors = cors;
        }
        if let Some(enabled) = env_bool("EXPENSE_SYNC_ENABLE_METRICS") {
            config.server.enable_metrics = enabled;
        }

        if let Ok(path) = std::env::var("EXPENSE_SYNC_SQLITE_PATH") {
            config.storage.sqlite_path = path.into();
        }

        if let Some(port) = env_parse::<u16>("EXPENSE_SYNC_PORT") {
            config.discovery.port = port;
            config.client.port = port;
        }
        if let Ok(prefixes) = std::env::var("EXPENSE_SYNC_PREFIXES") {
            config.discovery.prefixes = prefixes
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(max) = env_parse("EXPENSE_SYNC_MAX_CONCURRENT_PROBES") {
            config.discovery.max_concurrent_probes = max;
        }
        if let Some(secs) = env_parse::<u64>("EXPENSE_SYNC_PROBE_TIMEOUT") {
            config.discovery.probe_timeout_secs = secs;
            config.client.probe_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = env_parse("EXPENSE_SYNC_HEALTH_INTERVAL") {
            config.discovery.health_interval_secs = secs;
        }
        if let Some(secs) = env_parse::<u64>("EXPENSE_SYNC_FETCH_TIMEOUT") {
            config.client.fetch_timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(secs) = env_parse::<u64>("EXPENSE_SYNC_AUTO_REFRESH") {
            config.client.auto_refresh_ms = secs.saturating_mul(1000);
        }

        if let Ok(level) = std::env::var("EXPENSE_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("EXPENSE_SYNC_LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.server.validate().context("Invalid [server] section")?;
        self.discovery
            .validate()
            .context("Invalid [discovery] section")?;
        self.client.validate().context("Invalid [client] section")?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }
}
