//! Observability for the Hermes gateway.
//!
//! - **Logging**: structured `tracing` output, JSON or pretty
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//! - **Audit**: the batching background publisher behind
//!   [`hermes_core::AuditPublisher`]
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_telemetry::{init_telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_telemetry(&TelemetryConfig::default()).expect("telemetry");
//! }
//! ```

#![warn(missing_docs)]

pub mod audit;
pub mod error;
pub mod logging;
pub mod metrics;

pub use audit::{
    AuditSink, AuditWorker, BatchConfig, BatchingPublisher, HttpSink, LogSink,
};
pub use error::{SinkError, TelemetryError};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name carried in audit records and log lines.
    pub service_name: String,

    /// Logging configuration.
    pub logging: LogConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hermes".to_string(),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    tracing::debug!(service = %config.service_name, "telemetry initialized");
    Ok(())
}
