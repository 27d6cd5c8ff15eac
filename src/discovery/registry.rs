//! Server registry
//!
//! In-memory collection of every data server the client knows about,
//! regardless of whether it is connected. Entries are keyed by `host:port`,
//! created when a scan first finds the server online and never removed during
//! a session; a server that stops answering stays listed as offline.
//!
//! All mutation goes through [`ServerRegistry::apply_probe`], so scans and
//! health checks serialize on one write path while readers take snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::metrics;

use super::prober::ProbeOutcome;

const EVENT_CAPACITY: usize = 256;

// ============================================================================
// Server Status
// ============================================================================

/// Last observed liveness of a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// Answered the last probe with a matching signature
    Online,

    /// Failed the last probe for any reason
    #[default]
    Offline,
}

impl ServerStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Server Record
// ============================================================================

/// Information about a known server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    /// `host:port` of the server
    pub address: String,

    /// Advertised device name, or the address
    pub display_name: String,

    /// Current status
    pub status: ServerStatus,

    /// Last successful probe
    pub last_seen: DateTime<Utc>,

    /// Last probe attempt, successful or not
    pub last_checked: DateTime<Utc>,

    /// Version reported by the server
    pub app_version: Option<String>,
}

impl ServerRecord {
    fn from_online(outcome: &ProbeOutcome) -> Self {
        let mut record = Self {
            address: outcome.address.clone(),
            display_name: outcome.address.clone(),
            status: ServerStatus::Online,
            last_seen: outcome.checked_at,
            last_checked: outcome.checked_at,
            app_version: None,
        };
        record.absorb_identity(outcome);
        record
    }

    fn absorb_identity(&mut self, outcome: &ProbeOutcome) {
        if let Some(server) = &outcome.server {
            if let Some(name) = server.device_name.as_deref().filter(|n| !n.trim().is_empty()) {
                self.display_name = name.to_string();
            }
            self.app_version = Some(server.version.clone());
        }
    }

    /// Seconds since the server last answered
    pub fn seconds_since_seen(&self) -> i64 {
        (Utc::now() - self.last_seen).num_seconds()
    }
}

// ============================================================================
// Registry Events
// ============================================================================

/// Change notifications for incremental rendering
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A server was added to the registry
    Discovered(ServerRecord),

    /// A known server changed status
    StatusChanged {
        address: String,
        previous: ServerStatus,
        current: ServerStatus,
    },
}

// ============================================================================
// Server Registry
// ============================================================================

/// Registry of known servers
pub struct ServerRegistry {
    servers: RwLock<HashMap<String, ServerRecord>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            servers: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Subscribe to registry changes
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Record the outcome of a probe
    ///
    /// Known servers are updated in place: online refreshes `last_seen`,
    /// offline leaves it untouched. Unknown servers are inserted only when
    /// `insert_if_missing` is set and the probe succeeded. Returns the updated
    /// record, if any.
    pub async fn apply_probe(
        &self,
        outcome: &ProbeOutcome,
        insert_if_missing: bool,
    ) -> Option<ServerRecord> {
        let mut servers = self.servers.write().await;

        let (record, event) = match servers.get_mut(&outcome.address) {
            Some(record) => {
                let previous = record.status;
                record.status = outcome.status;
                record.last_checked = outcome.checked_at;
                if outcome.status.is_online() {
                    record.last_seen = outcome.checked_at;
                    record.absorb_identity(outcome);
                }

                let event = (previous != outcome.status).then(|| RegistryEvent::StatusChanged {
                    address: outcome.address.clone(),
                    previous,
                    current: outcome.status,
                });
                (record.clone(), event)
            }
            None if insert_if_missing && outcome.status.is_online() => {
                let record = ServerRecord::from_online(outcome);
                servers.insert(record.address.clone(), record.clone());
                (record.clone(), Some(RegistryEvent::Discovered(record)))
            }
            None => return None,
        };

        let (online, offline) = count_statuses(servers.values());
        drop(servers);

        metrics::set_registry_servers(online, offline);
        if let Some(event) = event {
            match &event {
                RegistryEvent::Discovered(r) => {
                    tracing::info!(address = %r.address, name = %r.display_name, "Server discovered");
                }
                RegistryEvent::StatusChanged {
                    address, current, ..
                } => {
                    tracing::info!(address = %address, status = %current, "Server status changed");
                }
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }

        Some(record)
    }

    /// Get one server
    pub async fn get(&self, address: &str) -> Option<ServerRecord> {
        self.servers.read().await.get(address).cloned()
    }

    /// Snapshot of all servers, sorted by address
    pub async fn snapshot(&self) -> Vec<ServerRecord> {
        let mut servers: Vec<_> = self.servers.read().await.values().cloned().collect();
        servers.sort_by(|a, b| a.address.cmp(&b.address));
        servers
    }

    /// Snapshot of servers currently online
    pub async fn online(&self) -> Vec<ServerRecord> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|s| s.status.is_online())
            .collect()
    }

    /// Addresses of every known server
    pub async fn addresses(&self) -> Vec<String> {
        self.servers.read().await.keys().cloned().collect()
    }

    /// Number of known servers
    pub async fn len(&self) -> usize {
        self.servers.read().await.len()
    }

    /// Whether no server is known
    pub async fn is_empty(&self) -> bool {
        self.servers.read().await.is_empty()
    }

    /// Get registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let servers = self.servers.read().await;
        let (online, offline) = count_statuses(servers.values());
        RegistryStats {
            total_servers: servers.len(),
            online,
            offline,
        }
    }
}

fn count_statuses<'a>(records: impl Iterator<Item = &'a ServerRecord>) -> (usize, usize) {
    records.fold((0, 0), |(online, offline), r| match r.status {
        ServerStatus::Online => (online + 1, offline),
        ServerStatus::Offline => (online, offline + 1),
    })
}

/// Registry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total_servers: usize,
    pub online: usize,
    pub offline: usize,
}

impl RegistryStats {
    /// Get availability percentage
    pub fn availability(&self) -> f64 {
        if self.total_servers == 0 {
            0.0
        } else {
            (self.online as f64 / self.total_servers as f64) * 100.0
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
