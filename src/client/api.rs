//! HTTP client for the data server API
//!
//! One [`ApiClient`] is shared by probers and the connection manager. Every
//! request carries an explicit timeout and is never retried here; retrying is
//! the caller's decision.

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::endpoint::DEFAULT_PORT;
use crate::metrics;
use crate::models::{
    AggregateStats, EstablishmentSummary, ItemsResponse, ProductSummary, ProductsResponse,
    EstablishmentsResponse, PurchaseRecord, StatusResponse,
};

/// Default timeout for liveness probes
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for resource fetches
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Resources
// ============================================================================

/// Resources served by the data server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Status,
    Items,
    Stats,
    Products,
    Establishments,
}

impl Resource {
    /// Request path of the resource
    pub fn path(&self) -> &'static str {
        match self {
            Self::Status => "/api/status",
            Self::Items => "/api/items",
            Self::Stats => "/api/stats",
            Self::Products => "/api/products",
            Self::Establishments => "/api/establishments",
        }
    }

    /// Short name used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Items => "items",
            Self::Stats => "stats",
            Self::Products => "products",
            Self::Establishments => "establishments",
        }
    }
}

// ============================================================================
// Addresses
// ============================================================================

/// Normalize a user supplied server address to `host:port`
///
/// Accepts `192.168.1.20`, `192.168.1.20:3000`, `http://192.168.1.20:3000/`
/// and host names. The default port is applied when none is given.
pub fn normalize_address(input: &str, default_port: u16) -> Result<String, ClientError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ClientError::InvalidAddress("empty address".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = url::Url::parse(&with_scheme)
        .map_err(|e| ClientError::InvalidAddress(format!("{trimmed}: {e}")))?;

    if url.scheme() != "http" {
        return Err(ClientError::InvalidAddress(format!(
            "{trimmed}: only plain http is supported"
        )));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ClientError::InvalidAddress(format!("{trimmed}: missing host")))?;

    // Url drops the scheme's default port, so an explicit ":80" has to be
    // recovered from the authority text.
    let authority = with_scheme
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or_default();
    let port = url
        .port()
        .or_else(|| authority.ends_with(":80").then_some(80))
        .unwrap_or(default_port);

    Ok(format!("{host}:{port}"))
}

/// Normalize with the well-known server port
pub fn normalize_default(input: &str) -> Result<String, ClientError> {
    normalize_address(input, DEFAULT_PORT)
}

// ============================================================================
// Api Client
// ============================================================================

/// Client for talking to data servers
#[derive(Debug, Clone)]
pub struct ApiClient {
    http_client: Client,
    timeout: Duration,
}

impl ApiClient {
    /// Create a client whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(format!("expense-sync/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `/api/status` and check its application signature
    pub async fn status(
        &self,
        address: &str,
        expected_app_name: &str,
    ) -> Result<StatusResponse, ClientError> {
        let status: StatusResponse = self.get_json(address, Resource::Status).await?;

        if !status.matches_signature(expected_app_name) {
            return Err(ClientError::Incompatible(format!(
                "unexpected application '{}' (status '{}')",
                status.app_name, status.status
            )));
        }

        Ok(status)
    }

    /// Fetch the full record list
    pub async fn items(&self, address: &str) -> Result<Vec<PurchaseRecord>, ClientError> {
        let body: ItemsResponse = self.get_json(address, Resource::Items).await?;
        Ok(body.items)
    }

    /// Fetch scalar aggregates
    pub async fn stats(&self, address: &str) -> Result<AggregateStats, ClientError> {
        self.get_json(address, Resource::Stats).await
    }

    /// Fetch per-product aggregates
    pub async fn products(&self, address: &str) -> Result<Vec<ProductSummary>, ClientError> {
        let body: ProductsResponse = self.get_json(address, Resource::Products).await?;
        Ok(body.products)
    }

    /// Fetch per-establishment aggregates
    pub async fn establishments(
        &self,
        address: &str,
    ) -> Result<Vec<EstablishmentSummary>, ClientError> {
        let body: EstablishmentsResponse = self.get_json(address, Resource::Establishments).await?;
        Ok(body.establishments)
    }

    // Internal: single GET with an outer deadline on top of the client timeout
    async fn get_json<T: DeserializeOwned>(
        &self,
        address: &str,
        resource: Resource,
    ) -> Result<T, ClientError> {
        let url = format!("http://{}{}", address, resource.path());

        let request = async {
            let response = self
                .http_client
                .get(&url)
                .send()
                .await
                .map_err(ClientError::from_reqwest)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::from_status(status));
            }

            response.json::<T>().await.map_err(ClientError::from_reqwest)
        };

        let result = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Unreachable(format!(
                "no response within {}ms",
                self.timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            tracing::debug!(address = %address, resource = resource.name(), error = %e, "Request failed");
            if resource != Resource::Status {
                metrics::record_fetch_failure(resource.name());
            }
        }

        result
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Why a request against a server failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// HTTP client could not be built
    #[error("Initialization error: {0}")]
    InitError(String),

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// No response within the timeout, or the connection failed
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    /// Response received but not from a compatible server
    #[error("Incompatible server: {0}")]
    Incompatible(String),

    /// Server reachable but answered with an error status
    #[error("Server error ({status})")]
    ServerError { status: u16 },

    /// Caller cancelled the operation
    #[error("Operation aborted")]
    Aborted,

    /// Operation requires an active connection
    #[error("Not connected to a server")]
    NotConnected,
}

impl ClientError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Incompatible(format!("malformed response body: {err}"))
        } else if err.is_timeout() {
            Self::Unreachable(format!("request timed out: {err}"))
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::NOT_FOUND {
            Self::Incompatible(format!("resource not served ({status})"))
        } else {
            Self::ServerError {
                status: status.as_u16(),
            }
        }
    }

    /// Whether retrying the same request could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::ServerError { .. } | Self::Aborted
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
