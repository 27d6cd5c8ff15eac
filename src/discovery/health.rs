//! Periodic re-probing of known servers
//!
//! Keeps registry entries current without a fresh sweep: every interval each
//! known address is probed once and its record updated in place. A pass is
//! skipped while a sweep runs so the two never stack their probes.
//!
//! The monitor only writes to the registry. An active connection is never
//! torn down from here; it notices an outage on its next refresh.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::registry::ServerStatus;
use super::scanner::DiscoveryEngine;

/// Result of one health pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthReport {
    pub checked: usize,
    pub online: usize,
    pub offline: usize,
}

/// Background re-prober for registry entries
pub struct HealthMonitor {
    engine: Arc<DiscoveryEngine>,
    interval: Duration,
}

impl HealthMonitor {
    /// Create a monitor running every `interval`
    pub fn new(engine: Arc<DiscoveryEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Check interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one pass now
    ///
    /// Returns `None` when the pass was skipped because a sweep (or another
    /// pass) holds the probe budget.
    pub async fn check_now(&self) -> Option<HealthReport> {
        let Some(_guard) = self.engine.try_health_pass() else {
            tracing::debug!("Health pass skipped: scan in progress");
            return None;
        };

        let registry = self.engine.registry();
        let addresses = registry.addresses().await;
        if addresses.is_empty() {
            return Some(HealthReport::default());
        }

        let prober = self.engine.prober();
        let statuses: Vec<ServerStatus> = stream::iter(addresses)
            .map(|address| async move { prober.probe(&address).await })
            .buffer_unordered(self.engine.max_concurrent())
            .then(|outcome| async move {
                registry.apply_probe(&outcome, false).await;
                outcome.status
            })
            .collect()
            .await;

        let online = statuses.iter().filter(|s| s.is_online()).count();
        let report = HealthReport {
            checked: statuses.len(),
            online,
            offline: statuses.len() - online,
        };

        tracing::debug!(
            checked = report.checked,
            online = report.online,
            offline = report.offline,
            "Health pass complete"
        );
        Some(report)
    }

    /// Start the periodic loop; the first pass runs one interval from now
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut interval = tokio::time::interval_at(start, self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(interval_secs = self.interval.as_secs(), "Health monitor started");

            loop {
                interval.tick().await;
                self.check_now().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::discovery::candidates::CandidateSpace;
    use crate::discovery::prober::{Probe, ProbeOutcome};
    use crate::discovery::registry::ServerRegistry;
    use crate::models::StatusResponse;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Online until `down` is set
    struct SwitchProber {
        down: AtomicBool,
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl Probe for SwitchProber {
        async fn probe(&self, address: &str) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.down.load(Ordering::SeqCst) {
                ProbeOutcome::offline(address, ClientError::Unreachable("timeout".to_string()))
            } else {
                ProbeOutcome::online(
                    address,
                    StatusResponse {
                        status: "online".to_string(),
                        app_name: "expense-tracker".to_string(),
                        version: "1.0.0".to_string(),
                        timestamp: String::new(),
                        device_name: None,
                    },
                )
            }
        }
    }

    fn setup(down: bool) -> (Arc<SwitchProber>, Arc<DiscoveryEngine>) {
        setup_with_delay(down, Duration::ZERO)
    }

    fn setup_with_delay(down: bool, delay: Duration) -> (Arc<SwitchProber>, Arc<DiscoveryEngine>) {
        let prober = Arc::new(SwitchProber {
            down: AtomicBool::new(down),
            calls: AtomicUsize::new(0),
            delay,
        });
        let engine = Arc::new(DiscoveryEngine::new(
            Arc::new(ServerRegistry::new()),
            prober.clone(),
            CandidateSpace::new([[10, 0, 0]], 3000),
            4,
        ));
        (prober, engine)
    }

    async fn seed_online(engine: &DiscoveryEngine, address: &str, at: chrono::DateTime<Utc>) {
        let mut outcome = ProbeOutcome::online(
            address,
            StatusResponse {
                status: "online".to_string(),
                app_name: "expense-tracker".to_string(),
                version: "1.0.0".to_string(),
                timestamp: String::new(),
                device_name: None,
            },
        );
        outcome.checked_at = at;
        engine.registry().apply_probe(&outcome, true).await;
    }

    #[tokio::test]
    async fn test_host_going_offline_keeps_last_seen() {
        let (_prober, engine) = setup(true);
        let t0 = Utc::now() - ChronoDuration::seconds(30);
        seed_online(&engine, "10.0.0.5:3000", t0).await;

        let monitor = HealthMonitor::new(engine.clone(), Duration::from_secs(30));
        let report = monitor.check_now().await.unwrap();

        assert_eq!(report.checked, 1);
        assert_eq!(report.offline, 1);

        let record = engine.registry().get("10.0.0.5:3000").await.unwrap();
        assert_eq!(record.status, ServerStatus::Offline);
        assert_eq!(record.last_seen, t0);
    }

    #[tokio::test]
    async fn test_host_coming_back_refreshes_last_seen() {
        let (prober, engine) = setup(true);
        let t0 = Utc::now() - ChronoDuration::seconds(60);
        seed_online(&engine, "10.0.0.5:3000", t0).await;

        let monitor = HealthMonitor::new(engine.clone(), Duration::from_secs(30));
        monitor.check_now().await.unwrap();

        prober.down.store(false, Ordering::SeqCst);
        let report = monitor.check_now().await.unwrap();
        assert_eq!(report.online, 1);

        let record = engine.registry().get("10.0.0.5:3000").await.unwrap();
        assert_eq!(record.status, ServerStatus::Online);
        assert!(record.last_seen > t0);
    }

    #[tokio::test]
    async fn test_only_known_addresses_probed() {
        let (prober, engine) = setup(false);
        seed_online(&engine, "10.0.0.5:3000", Utc::now()).await;
        seed_online(&engine, "10.0.0.6:3000", Utc::now()).await;

        let monitor = HealthMonitor::new(engine.clone(), Duration::from_secs(30));
        let report = monitor.check_now().await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_skipped_while_scanning() {
        let (_prober, engine) = setup_with_delay(true, Duration::from_millis(5));
        let t0 = Utc::now() - ChronoDuration::seconds(30);
        seed_online(&engine, "192.168.50.9:3000", t0).await;
        let monitor = HealthMonitor::new(engine.clone(), Duration::from_secs(30));

        let running = engine.clone().spawn_scan();
        while !engine.is_scanning() {
            tokio::task::yield_now().await;
        }

        assert!(monitor.check_now().await.is_none());
        // The known server outside the sweep was not re-probed
        let record = engine.registry().get("192.168.50.9:3000").await.unwrap();
        assert_eq!(record.status, ServerStatus::Online);

        engine.cancel_scan();
        running.await.unwrap().unwrap();

        let report = monitor.check_now().await.unwrap();
        assert_eq!(report.offline, 1);
    }

    #[tokio::test]
    async fn test_skipped_while_lock_held() {
        let (_prober, engine) = setup(false);
        let monitor = HealthMonitor::new(engine.clone(), Duration::from_secs(30));

        let guard = engine.try_health_pass();
        assert!(guard.is_some());
        // Lock already held: a second pass is skipped
        assert!(monitor.check_now().await.is_none());
        drop(guard);

        assert!(monitor.check_now().await.is_some());
    }

    #[tokio::test]
    async fn test_periodic_loop_runs() {
        let (prober, engine) = setup(false);
        seed_online(&engine, "10.0.0.5:3000", Utc::now()).await;

        let monitor = Arc::new(HealthMonitor::new(engine, Duration::from_millis(20)));
        let handle = monitor.start();

        tokio::time::sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert!(prober.calls.load(Ordering::SeqCst) >= 2);
    }
}
