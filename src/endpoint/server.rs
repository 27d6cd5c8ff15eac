//! Data server implementation
//!
//! Binds the API router to the local network interface and serves the
//! provider's data until shut down.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::provider::DataProvider;

use super::api::create_router;
use super::config::ServerConfig;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Source of all served data
    pub provider: Arc<dyn DataProvider>,

    /// Configuration
    pub config: ServerConfig,
}

// ============================================================================
// Sync Server
// ============================================================================

/// HTTP server exposing the read-only data API
pub struct SyncServer {
    config: ServerConfig,
    state: AppState,
}

impl SyncServer {
    /// Create a new server over `provider`
    pub fn new(config: ServerConfig, provider: Arc<dyn DataProvider>) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|e| ServerError::ConfigError(e.to_string()))?;

        let state = AppState {
            provider,
            config: config.clone(),
        };

        Ok(Self { config, state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        if self.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::BindError(format!("{}: {e}", self.config.bind_address)))
    }

    /// Start the server on the configured address
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener until `shutdown_signal` resolves
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let router = self.build_router();
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(e.to_string()))?;

        tracing::info!(address = %addr, app_name = %self.config.app_name, "Data server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        tracing::info!("Data server shutdown complete");
        Ok(())
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            bind_address: self.config.bind_address,
            app_name: self.config.app_name.clone(),
            device_name: self.config.device_name.clone(),
            cors_enabled: self.config.enable_cors,
            request_logging_enabled: self.config.enable_request_logging,
            metrics_enabled: self.config.enable_metrics,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub app_name: String,
    pub device_name: Option<String>,
    pub cors_enabled: bool,
    pub request_logging_enabled: bool,
    pub metrics_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        let on_off = |flag: bool| if flag { "enabled" } else { "disabled" };
        format!(
            "Expense Sync Server\n\
             {:-<40}\n\
             Bind Address: {}\n\
             App Signature: {}\n\
             Device Name: {}\n\
             CORS: {}\n\
             Request Logging: {}\n\
             Metrics: {}",
            "",
            self.bind_address,
            self.app_name,
            self.device_name.as_deref().unwrap_or("-"),
            on_off(self.cors_enabled),
            on_off(self.request_logging_enabled),
            on_off(self.metrics_enabled)
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Error, Debug, Clone)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Failed to bind: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    ServeError(String),
}

// ============================================================================
// Tests
// ============================================================================
