//! Prometheus metrics for the sync endpoint and discovery client
//!
//! This module provides metrics tracking for:
//! - Endpoint: API requests by endpoint and status, request duration
//! - Discovery: probes by outcome, scan duration and hits, known servers
//! - Connection: failed resource fetches
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, metrics operations are
//! no-ops.

use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_histogram_vec,
    CounterVec, Encoder, GaugeVec, Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for endpoint metrics
struct EndpointMetrics {
    api_requests: CounterVec,
    api_duration: HistogramVec,
}

/// Container for discovery and connection metrics
struct DiscoveryMetrics {
    probes: CounterVec,
    scan_duration: Histogram,
    scan_found: CounterVec,
    registry_servers: GaugeVec,
    fetch_failures: CounterVec,
}

static ENDPOINT_METRICS: OnceLock<EndpointMetrics> = OnceLock::new();

static DISCOVERY_METRICS: OnceLock<DiscoveryMetrics> = OnceLock::new();

/// Outcome of the one registration attempt
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once and from several threads; only the first
/// call registers, later calls return its outcome.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = expense_sync::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    METRICS_INIT
        .get_or_init(|| register_all().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_all() -> Result<(), prometheus::Error> {
    let endpoint = EndpointMetrics {
        api_requests: register_counter_vec!(
            "expense_sync_api_requests_total",
            "Total API requests by endpoint and status",
            &["endpoint", "status"]
        )?,
        api_duration: register_histogram_vec!(
            "expense_sync_api_request_duration_seconds",
            "API request duration in seconds",
            &["endpoint"],
            vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
        )?,
    };

    let discovery = DiscoveryMetrics {
        probes: register_counter_vec!(
            "expense_sync_probes_total",
            "Total probes by outcome",
            &["status"]
        )?,
        scan_duration: register_histogram!(
            "expense_sync_scan_duration_seconds",
            "Subnet scan duration in seconds",
            vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
        )?,
        scan_found: register_counter_vec!(
            "expense_sync_scan_servers_found_total",
            "Servers found online by subnet scans",
            &["source"]
        )?,
        registry_servers: register_gauge_vec!(
            "expense_sync_registry_servers",
            "Known servers by status",
            &["status"]
        )?,
        fetch_failures: register_counter_vec!(
            "expense_sync_fetch_failures_total",
            "Failed resource fetches by resource",
            &["resource"]
        )?,
    };

    // Only reachable once, guarded by METRICS_INIT
    let _ = ENDPOINT_METRICS.set(endpoint);
    let _ = DISCOVERY_METRICS.set(discovery);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    ENDPOINT_METRICS.get().is_some() && DISCOVERY_METRICS.get().is_some()
}

// ============================================================================
// Export
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Encoded metrics, or an empty body if encoding fails
pub fn gather_metrics() -> String {
    encode_metrics().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to encode metrics");
        String::new()
    })
}

// ============================================================================
// Endpoint
// ============================================================================

/// Record API request
pub fn record_api_request(endpoint: &str, status: u16, duration_secs: f64) {
    let Some(m) = ENDPOINT_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, status_str.as_str()])
        .inc();
    m.api_duration
        .with_label_values(&[endpoint])
        .observe(duration_secs);
}

// ============================================================================
// Discovery
// ============================================================================

/// Record one resolved probe (`online` or `offline`)
pub fn record_probe(status: &str) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.probes.with_label_values(&[status]).inc();
    }
}

/// Record a finished subnet scan
pub fn record_scan(found: usize, duration_secs: f64) {
    let Some(m) = DISCOVERY_METRICS.get() else {
        return;
    };

    m.scan_duration.observe(duration_secs);
    if found > 0 {
        m.scan_found
            .with_label_values(&["scan"])
            .inc_by(found as f64);
    }
}

/// Update the known-server gauges
pub fn set_registry_servers(online: usize, offline: usize) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.registry_servers
            .with_label_values(&["online"])
            .set(online as f64);
        m.registry_servers
            .with_label_values(&["offline"])
            .set(offline as f64);
    }
}

/// Record a failed resource fetch
pub fn record_fetch_failure(resource: &str) {
    if let Some(m) = DISCOVERY_METRICS.get() {
        m.fetch_failures.with_label_values(&[resource]).inc();
    }
}

// ============================================================================
// Tests
// ============================================================================
