//! Server endpoint configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

use crate::models::APP_SIGNATURE;

/// Well-known port the endpoint listens on
pub const DEFAULT_PORT: u16 = 3000;

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Configuration for the data server endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Identity reported in `/api/status`, checked by probers
    pub app_name: String,

    /// Human readable device name advertised to clients
    pub device_name: Option<String>,

    /// Enable CORS for browser dashboards
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,

    /// Expose Prometheus metrics at `/metrics`
    pub enable_metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            app_name: APP_SIGNATURE.to_string(),
            device_name: None,
            enable_cors: true,
            enable_request_logging: true,
            enable_metrics: false,
        }
    }
}

impl ServerConfig {
    /// Create a new config builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "app_name".to_string(),
                reason: "Application signature must not be empty".to_string(),
            });
        }

        if let Some(name) = &self.device_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "device_name".to_string(),
                    reason: "Device name must not be blank when set".to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Builder for ServerConfig
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    bind_address: Option<SocketAddr>,
    app_name: Option<String>,
    device_name: Option<String>,
    enable_cors: Option<bool>,
    enable_request_logging: Option<bool>,
    enable_metrics: Option<bool>,
}

impl ServerConfigBuilder {
    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address".to_string(),
            reason: format!("Invalid address: {addr}"),
        })?);
        Ok(self)
    }

    /// Set the application signature
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the advertised device name
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Enable/disable CORS
    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Enable/disable the metrics route
    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<ServerConfig, ConfigError> {
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            app_name: self.app_name.unwrap_or(defaults.app_name),
            device_name: self.device_name,
            enable_cors: self.enable_cors.unwrap_or(defaults.enable_cors),
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
            enable_metrics: self.enable_metrics.unwrap_or(defaults.enable_metrics),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.app_name, APP_SIGNATURE);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::builder()
            .device_name("Kitchen phone")
            .enable_cors(false)
            .enable_metrics(true)
            .build()
            .unwrap();

        assert_eq!(config.device_name.as_deref(), Some("Kitchen phone"));
        assert!(!config.enable_cors);
        assert!(config.enable_metrics);
    }

    #[test]
    fn test_config_validation_fails() {
        let result = ServerConfig::builder().app_name("  ").build();
        assert!(result.is_err());

        let result = ServerConfig::builder().device_name("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_builder_with_address() {
        let config = ServerConfig::builder()
            .bind_address_str("127.0.0.1:9000")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(config.bind_address.port(), 9000);

        assert!(ServerConfig::builder().bind_address_str("not-an-addr").is_err());
    }
}
