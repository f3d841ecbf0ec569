//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur during telemetry operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors raised by an audit sink while shipping a batch.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The batch could not be serialized.
    #[error("failed to encode audit batch: {0}")]
    Encode(#[from] serde_json::Error),

    /// The collector could not be reached.
    #[error("audit collector unreachable: {0}")]
    Transport(String),

    /// The collector answered with a non-success status.
    #[error("audit collector rejected batch with status {status}")]
    Rejected {
        /// HTTP status returned by the collector.
        status: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::MetricsInit("failed".to_string());
        assert_eq!(err.to_string(), "Failed to initialize metrics: failed");

        let err = SinkError::Rejected { status: 503 };
        assert_eq!(err.to_string(), "audit collector rejected batch with status 503");
    }
}
