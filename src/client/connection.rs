//! Connection to one data server
//!
//! The manager owns a small state machine:
//!
//! ```text
//!  Disconnected ──connect──► Connecting(addr) ──ok──► Connected(addr)
//!        ▲                        │                      │   ▲
//!        │                        └──err──► Failed(e)    │   └─ refresh
//!        └────────── disconnect ─────────────────────────┘
//! ```
//!
//! A connect probes `/api/status`, then fetches the four data resources
//! concurrently. All four must succeed or nothing is exposed. Refreshes
//! replace the dataset wholesale; a failed refresh keeps the last good one.
//!
//! State is published on a `watch` channel so any number of views can follow
//! it without polling. Only the manager writes to it.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::MissedTickBehavior;

use crate::discovery::{HttpProber, Probe, ServerRecord};
use crate::models::{AggregateStats, EstablishmentSummary, ProductSummary, PurchaseRecord};

use super::api::{normalize_address, ApiClient, ClientError};
use super::ClientConfig;

// ============================================================================
// State
// ============================================================================

/// Connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No server selected
    #[default]
    Disconnected,

    /// Initial fetch against the address in progress
    Connecting(String),

    /// Dataset available for the address
    Connected(String),

    /// Last connect attempt failed
    Failed(ClientError),
}

impl ConnectionState {
    /// Address being connected to or connected to
    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Connecting(address) | Self::Connected(address) => Some(address),
            Self::Disconnected | Self::Failed(_) => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting(_) => "connecting",
            Self::Connected(_) => "connected",
            Self::Failed(_) => "failed",
        }
    }
}

/// Everything fetched from one server in a single pass
#[derive(Debug, Clone, PartialEq)]
pub struct SynchronizedDataset {
    /// Server the data came from
    pub address: String,
    pub items: Vec<PurchaseRecord>,
    pub stats: AggregateStats,
    pub products: Vec<ProductSummary>,
    pub establishments: Vec<EstablishmentSummary>,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// What observers see
#[derive(Debug, Clone, Default)]
pub struct ConnectionView {
    pub state: ConnectionState,
    pub dataset: Option<Arc<SynchronizedDataset>>,
    /// Error of the last failed refresh, cleared by the next success
    pub last_error: Option<ClientError>,
}

/// Marks a connect that never finished as aborted
struct ConnectGuard<'a> {
    view: &'a watch::Sender<ConnectionView>,
    address: String,
    armed: bool,
}

impl ConnectGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let address = &self.address;
        self.view.send_if_modified(|view| match &view.state {
            ConnectionState::Connecting(current) if current == address => {
                view.state = ConnectionState::Failed(ClientError::Aborted);
                true
            }
            _ => false,
        });
        tracing::info!(address = %address, "Connect abandoned");
    }
}

// ============================================================================
// Connection Manager
// ============================================================================

/// Owns the single active connection
pub struct ConnectionManager {
    prober: Arc<dyn Probe>,
    client: ApiClient,
    default_port: u16,
    view: watch::Sender<ConnectionView>,
    /// Serializes connect, refresh and disconnect
    op_lock: Mutex<()>,
    abort: Notify,
}

impl ConnectionManager {
    /// Create a manager as configured
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config
            .validate()
            .map_err(|e| ClientError::InitError(e.to_string()))?;

        let prober = HttpProber::with_timeout(config.probe_timeout(), config.app_name.clone())?;
        let client = ApiClient::new(config.fetch_timeout())?;
        Ok(Self::with_parts(Arc::new(prober), client, config.port))
    }

    /// Create a manager from explicit parts
    pub fn with_parts(prober: Arc<dyn Probe>, client: ApiClient, default_port: u16) -> Self {
        let (view, _) = watch::channel(ConnectionView::default());
        Self {
            prober,
            client,
            default_port,
            view,
            op_lock: Mutex::new(()),
            abort: Notify::new(),
        }
    }

    /// Current view
    pub fn snapshot(&self) -> ConnectionView {
        self.view.borrow().clone()
    }

    /// Follow view changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionView> {
        self.view.subscribe()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.view.borrow().state.clone()
    }

    /// Current dataset, if any
    pub fn dataset(&self) -> Option<Arc<SynchronizedDataset>> {
        self.view.borrow().dataset.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.view.borrow().state.is_connected()
    }

    /// Connect to a server picked from the registry
    pub async fn connect_record(
        &self,
        record: &ServerRecord,
    ) -> Result<Arc<SynchronizedDataset>, ClientError> {
        self.connect(&record.address).await
    }

    /// Connect to `target`, a registry address or a manually entered one
    ///
    /// An unparseable address is rejected without touching the state.
    /// Connecting to a different address drops the current dataset before the
    /// fetch begins; a failed reconnect to the same address keeps it.
    pub async fn connect(&self, target: &str) -> Result<Arc<SynchronizedDataset>, ClientError> {
        let address = normalize_address(target, self.default_port)?;
        let _op = self.op_lock.lock().await;

        self.view.send_modify(|view| {
            if view.dataset.as_ref().is_some_and(|d| d.address != address) {
                view.dataset = None;
            }
            view.state = ConnectionState::Connecting(address.clone());
            view.last_error = None;
        });
        tracing::info!(address = %address, "Connecting");

        let guard = ConnectGuard {
            view: &self.view,
            address: address.clone(),
            armed: true,
        };
        let result = self.abortable(self.establish(&address)).await;
        guard.disarm();

        match result {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                self.view.send_modify(|view| {
                    view.state = ConnectionState::Connected(address.clone());
                    view.dataset = Some(dataset.clone());
                    view.last_error = None;
                });
                tracing::info!(
                    address = %address,
                    items = dataset.items.len(),
                    "Connected"
                );
                Ok(dataset)
            }
            Err(e) => {
                self.view.send_modify(|view| {
                    view.state = ConnectionState::Failed(e.clone());
                });
                tracing::warn!(address = %address, error = %e, "Connect failed");
                Err(e)
            }
        }
    }

    /// Re-fetch the dataset of the connected server
    ///
    /// On failure the previous dataset stays visible, `last_error` is set and
    /// the state remains `Connected`.
    pub async fn refresh(&self) -> Result<Arc<SynchronizedDataset>, ClientError> {
        let _op = self.op_lock.lock().await;

        let address = match &self.view.borrow().state {
            ConnectionState::Connected(address) => address.clone(),
            _ => return Err(ClientError::NotConnected),
        };

        match self.abortable(self.fetch_dataset(&address)).await {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                self.view.send_modify(|view| {
                    view.dataset = Some(dataset.clone());
                    view.last_error = None;
                });
                tracing::debug!(address = %address, items = dataset.items.len(), "Refreshed");
                Ok(dataset)
            }
            Err(e) => {
                self.view.send_modify(|view| {
                    view.last_error = Some(e.clone());
                });
                tracing::warn!(address = %address, error = %e, "Refresh failed");
                Err(e)
            }
        }
    }

    /// Drop the connection, its dataset and any error
    pub async fn disconnect(&self) {
        self.abort();
        let _op = self.op_lock.lock().await;

        self.view.send_modify(|view| *view = ConnectionView::default());
        tracing::info!("Disconnected");
    }

    /// Cancel the connect or refresh in flight, if any
    pub fn abort(&self) {
        self.abort.notify_waiters();
    }

    /// Refresh on a fixed interval while connected
    ///
    /// Ticks that find no connection are skipped; failures only update
    /// `last_error`.
    pub fn start_auto_refresh(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut interval = tokio::time::interval_at(start, every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if self.is_connected() {
                    // Failure is already recorded in the view
                    let _ = self.refresh().await;
                }
            }
        })
    }

    // Internal: status probe, then the four resources
    async fn establish(&self, address: &str) -> Result<SynchronizedDataset, ClientError> {
        let outcome = self.prober.probe(address).await;
        if !outcome.status.is_online() {
            return Err(outcome
                .failure
                .unwrap_or_else(|| ClientError::Unreachable(address.to_string())));
        }

        self.fetch_dataset(address).await
    }

    async fn fetch_dataset(&self, address: &str) -> Result<SynchronizedDataset, ClientError> {
        let (items, stats, products, establishments) = tokio::try_join!(
            self.client.items(address),
            self.client.stats(address),
            self.client.products(address),
            self.client.establishments(address),
        )?;

        Ok(SynchronizedDataset {
            address: address.to_string(),
            items,
            stats,
            products,
            establishments,
            fetched_at: Utc::now(),
        })
    }

    async fn abortable<T>(
        &self,
        work: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        let aborted = self.abort.notified();
        tokio::pin!(aborted);
        aborted.as_mut().enable();

        tokio::select! {
            result = work => result,
            () = &mut aborted => {
                tracing::info!("Operation aborted");
                Err(ClientError::Aborted)
            }
        }
    }
}
