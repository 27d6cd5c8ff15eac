//! Subnet sweep
//!
//! Probes every address of a [`CandidateSpace`] with a bounded number of
//! probes in flight, feeding results into the registry as they resolve.

use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};

use crate::metrics;

use super::candidates::CandidateSpace;
use super::prober::{HttpProber, Probe};
use super::registry::ServerRegistry;
use super::{DiscoveryConfig, DiscoveryError};

/// Summary of a completed sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Candidates whose probe resolved
    pub probed: usize,

    /// Candidates found online
    pub found: usize,

    /// Whether the sweep was cancelled before drawing every candidate
    pub cancelled: bool,

    /// Wall time of the sweep
    pub elapsed: Duration,
}

/// Clears the cancel and scanning flags however the scan future ends
struct ScanFlag<'a> {
    scanning: &'a AtomicBool,
    cancel: &'a AtomicBool,
}

impl Drop for ScanFlag<'_> {
    fn drop(&mut self) {
        self.cancel.store(false, Ordering::SeqCst);
        self.scanning.store(false, Ordering::SeqCst);
    }
}

/// Finds servers by sweeping the candidate space
pub struct DiscoveryEngine {
    registry: Arc<ServerRegistry>,
    prober: Arc<dyn Probe>,
    space: CandidateSpace,
    max_concurrent: usize,
    scanning: AtomicBool,
    cancel: AtomicBool,
    /// Held by a sweep or a health pass; they never overlap
    sweep_lock: Mutex<()>,
}

impl DiscoveryEngine {
    /// Create an engine with an explicit prober
    pub fn new(
        registry: Arc<ServerRegistry>,
        prober: Arc<dyn Probe>,
        space: CandidateSpace,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry,
            prober,
            space,
            max_concurrent: max_concurrent.max(1),
            scanning: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Create an engine probing over HTTP as configured
    pub fn from_config(
        config: &DiscoveryConfig,
        registry: Arc<ServerRegistry>,
    ) -> Result<Self, DiscoveryError> {
        config.validate()?;

        let prober = HttpProber::with_timeout(config.probe_timeout(), config.app_name.clone())
            .map_err(|e| DiscoveryError::ProberInit(e.to_string()))?;

        Ok(Self::new(
            registry,
            Arc::new(prober),
            config.candidate_space()?,
            config.max_concurrent_probes,
        ))
    }

    /// Registry this engine feeds
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// Default candidate space
    pub fn space(&self) -> &CandidateSpace {
        &self.space
    }

    /// Whether a sweep is running
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Stop drawing new candidates; in-flight probes still resolve
    pub fn cancel_scan(&self) {
        if self.is_scanning() {
            tracing::info!("Cancelling subnet scan");
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// Sweep the default candidate space
    pub async fn scan(&self) -> Result<ScanReport, DiscoveryError> {
        self.scan_space(&self.space).await
    }

    /// Sweep the default space on a background task
    pub fn spawn_scan(self: Arc<Self>) -> tokio::task::JoinHandle<Result<ScanReport, DiscoveryError>> {
        tokio::spawn(async move { self.scan().await })
    }

    /// Sweep `space`
    ///
    /// Rejected with [`DiscoveryError::ScanInProgress`] while another sweep
    /// runs. Always completes once every drawn candidate resolved, whatever
    /// the individual probe results.
    pub async fn scan_space(&self, space: &CandidateSpace) -> Result<ScanReport, DiscoveryError> {
        if space.is_empty() {
            return Err(DiscoveryError::EmptySearchSpace);
        }

        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DiscoveryError::ScanInProgress);
        }
        let _flag = ScanFlag {
            scanning: &self.scanning,
            cancel: &self.cancel,
        };

        // Waits for a running health pass to finish
        let _sweep = self.sweep_lock.lock().await;

        tracing::info!(
            candidates = space.len(),
            prefixes = space.prefixes().len(),
            port = space.port(),
            max_concurrent = self.max_concurrent,
            "Starting subnet scan"
        );

        let started = Instant::now();
        let probed = AtomicUsize::new(0);
        let found = AtomicUsize::new(0);

        stream::iter(space.iter())
            .take_while(|_| futures::future::ready(!self.cancel.load(Ordering::SeqCst)))
            .for_each_concurrent(self.max_concurrent, |candidate| {
                let probed = &probed;
                let found = &found;
                async move {
                    let outcome = self.prober.probe(&candidate.to_string()).await;
                    probed.fetch_add(1, Ordering::Relaxed);
                    if outcome.status.is_online() {
                        found.fetch_add(1, Ordering::Relaxed);
                    }
                    self.registry.apply_probe(&outcome, true).await;
                }
            })
            .await;

        let report = ScanReport {
            probed: probed.into_inner(),
            found: found.into_inner(),
            cancelled: self.cancel.load(Ordering::SeqCst),
            elapsed: started.elapsed(),
        };

        metrics::record_scan(report.found, report.elapsed.as_secs_f64());
        tracing::info!(
            probed = report.probed,
            found = report.found,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Subnet scan complete"
        );

        Ok(report)
    }

    /// Lock for a health pass, unless a sweep is running or the lock is held
    pub(super) fn try_health_pass(&self) -> Option<MutexGuard<'_, ()>> {
        if self.is_scanning() {
            return None;
        }
        self.sweep_lock.try_lock().ok()
    }

    pub(super) fn prober(&self) -> &Arc<dyn Probe> {
        &self.prober
    }

    pub(super) fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
