//! Prometheus metrics for Hermes.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hermes_requests_total` | Counter | `route`, `status` | Finished requests |
//! | `hermes_request_duration_seconds` | Histogram | `route` | Request latency |
//! | `hermes_audit_records_dropped_total` | Counter | - | Audit records lost |
//! | `hermes_audit_batches_total` | Counter | `outcome` | Audit batches by outcome |
//!
//! Recording functions are safe to call before [`init_metrics`]; the
//! `metrics` facade discards values until a recorder is installed.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Address of the Prometheus scrape endpoint (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and spawns its scrape listener.
///
/// Does nothing when metrics are disabled. Must be called from within a
/// Tokio runtime.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .build()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    tokio::spawn(async move {
        if let Err(error) = exporter.await {
            tracing::error!(error = ?error, "prometheus exporter stopped");
        }
    });

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    tracing::info!(addr = %addr, "prometheus exporter listening");
    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!("hermes_requests_total", "Total number of requests answered");
    describe_histogram!(
        "hermes_request_duration_seconds",
        "Request processing time in seconds"
    );
    describe_counter!(
        "hermes_audit_records_dropped_total",
        "Audit records dropped because the queue was full or delivery failed"
    );
    describe_counter!(
        "hermes_audit_batches_total",
        "Audit batches handed to the sink, by outcome"
    );
}

/// Records a finished request.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "hermes_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "hermes_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records audit records lost before reaching the sink.
pub fn record_audit_dropped(count: u64) {
    counter!("hermes_audit_records_dropped_total").increment(count);
}

/// Records the outcome of one batch delivery (`shipped` or `dropped`).
pub fn record_audit_batch(outcome: &'static str) {
    counter!("hermes_audit_batches_total", "outcome" => outcome).increment(1);
}
