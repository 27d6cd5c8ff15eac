//! Single-address liveness probe
//!
//! A probe asks one address for `/api/status` and classifies the answer as
//! online or offline. It never fails: a dead host, an unrelated HTTP service
//! on the same port or a timeout are all ordinary offline outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::client::{ApiClient, ClientError, PROBE_TIMEOUT};
use crate::metrics;
use crate::models::{StatusResponse, APP_SIGNATURE};

use super::registry::ServerStatus;

/// Extra time granted on top of the request timeout before a probe is
/// abandoned outright
const PROBE_GRACE: Duration = Duration::from_millis(250);

/// Result of probing one address
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Probed `host:port`
    pub address: String,

    /// Classification
    pub status: ServerStatus,

    /// When the probe resolved
    pub checked_at: DateTime<Utc>,

    /// Status body, for online servers
    pub server: Option<StatusResponse>,

    /// Failure reason, for offline servers
    pub failure: Option<ClientError>,
}

impl ProbeOutcome {
    /// Online outcome carrying the server's status body
    pub fn online(address: impl Into<String>, server: StatusResponse) -> Self {
        Self {
            address: address.into(),
            status: ServerStatus::Online,
            checked_at: Utc::now(),
            server: Some(server),
            failure: None,
        }
    }

    /// Offline outcome with the reason it failed
    pub fn offline(address: impl Into<String>, failure: ClientError) -> Self {
        Self {
            address: address.into(),
            status: ServerStatus::Offline,
            checked_at: Utc::now(),
            server: None,
            failure: Some(failure),
        }
    }
}

/// Liveness check against a single address
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe `address` (`host:port`); must resolve within the probe timeout
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

/// Probe over HTTP with signature validation
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: ApiClient,
    expected_app_name: String,
}

impl HttpProber {
    /// Create a prober with the default timeout and signature
    pub fn new() -> Result<Self, ClientError> {
        Self::with_timeout(PROBE_TIMEOUT, APP_SIGNATURE)
    }

    /// Create a prober with a custom timeout and expected signature
    pub fn with_timeout(
        timeout: Duration,
        expected_app_name: impl Into<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            client: ApiClient::new(timeout)?,
            expected_app_name: expected_app_name.into(),
        })
    }

    /// Probe timeout
    pub fn timeout(&self) -> Duration {
        self.client.timeout()
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let deadline = self.client.timeout() + PROBE_GRACE;
        let check = self.client.status(address, &self.expected_app_name);

        let outcome = match tokio::time::timeout(deadline, check).await {
            Ok(Ok(server)) => ProbeOutcome::online(address, server),
            Ok(Err(e)) => ProbeOutcome::offline(address, e),
            Err(_) => ProbeOutcome::offline(
                address,
                ClientError::Unreachable(format!("probe abandoned after {}ms", deadline.as_millis())),
            ),
        };

        metrics::record_probe(outcome.status.as_str());
        tracing::trace!(address = %address, status = %outcome.status, "Probe resolved");
        outcome
    }
}
