//! Unified error handling for the expense-sync crate
//!
//! Each module owns a focused error enum; this module wraps them in one
//! [`Error`] for code that crosses module boundaries (the binary, mostly).
//!
//! # Architecture
//!
//! - [`SyncErrorTrait`] - Common interface implemented by the unified error
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use expense_sync::error::{Error, SyncErrorTrait};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         println!("Try again: {}", err.user_message());
//!     } else {
//!         eprintln!("Fatal error: {}", err);
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::client::ClientError;
pub use crate::discovery::DiscoveryError;
pub use crate::endpoint::{ConfigError, ServerError};
pub use crate::provider::ProviderError;

/// Common trait for expense-sync error types
pub trait SyncErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the same call may succeed later)
    fn is_recoverable(&self) -> bool;

    /// Short message suitable for showing to a user
    fn user_message(&self) -> String;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Server unreachable, timeouts, error statuses
    Network,
    /// Responses that are not what a compatible server sends
    Protocol,
    /// Record store and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Caller misuse or cancelled operations
    Usage,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Protocol => "protocol",
            Self::Storage => "storage",
            Self::Config => "config",
            Self::Usage => "usage",
            Self::Other => "other",
        }
    }
}

/// Unified error type for the expense-sync crate
#[derive(Error, Debug)]
pub enum Error {
    /// Record store errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Errors talking to a data server
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Scan and discovery errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Endpoint startup and serving errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Endpoint configuration errors
    #[error("Server config error: {0}")]
    ServerConfig(#[from] ConfigError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl SyncErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Client(e) => e.is_recoverable(),
            Self::Discovery(e) => matches!(e, DiscoveryError::ScanInProgress),
            Self::Provider(e) => matches!(e, ProviderError::Read(_)),
            Self::Io(_) => true,
            Self::Server(_)
            | Self::ServerConfig(_)
            | Self::Json(_)
            | Self::Config(_)
            | Self::Other { .. } => false,
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Client(ClientError::Unreachable(_)) => {
                "The server did not answer. Check that it is running on the same network.".to_string()
            }
            Self::Client(ClientError::Incompatible(_)) => {
                "The address answered, but it is not an expense tracker server.".to_string()
            }
            Self::Client(ClientError::ServerError { status }) => {
                format!("The server reported an error ({status}).")
            }
            Self::Discovery(DiscoveryError::ScanInProgress) => {
                "A scan is already running.".to_string()
            }
            other => other.to_string(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Client(e) => match e {
                ClientError::Unreachable(_) | ClientError::ServerError { .. } => ErrorCategory::Network,
                ClientError::Incompatible(_) => ErrorCategory::Protocol,
                ClientError::InitError(_) => ErrorCategory::Config,
                ClientError::InvalidAddress(_) | ClientError::NotConnected | ClientError::Aborted => {
                    ErrorCategory::Usage
                }
            },
            Self::Discovery(e) => match e {
                DiscoveryError::ScanInProgress | DiscoveryError::EmptySearchSpace => ErrorCategory::Usage,
                DiscoveryError::InvalidPrefix(_)
                | DiscoveryError::InvalidConfig(_)
                | DiscoveryError::ProberInit(_) => ErrorCategory::Config,
            },
            Self::Provider(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Server(ServerError::ConfigError(_)) | Self::ServerConfig(_) | Self::Config(_) => {
                ErrorCategory::Config
            }
            Self::Server(_) => ErrorCategory::Network,
            Self::Json(_) => ErrorCategory::Protocol,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
