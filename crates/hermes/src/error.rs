//! Startup errors for the gateway application.
//!
//! Request-path failures are [`hermes_core::GatewayError`] values and never
//! surface here; these errors stop the process before it serves traffic.

use hermes_config::ConfigError;
use hermes_core::CipherError;
use hermes_middleware::SchemaError;
use hermes_server::ServerError;
use hermes_telemetry::{SinkError, TelemetryError};
use thiserror::Error;

/// Result type for application setup.
pub type AppResult<T> = Result<T, AppError>;

/// Errors raised while building or running the gateway.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A bundled schema failed to compile.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The token cipher could not be built.
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// The identity provider could not be built.
    #[error("Identity provider error: {message}")]
    Identity {
        /// Error message.
        message: String,
    },

    /// The Graph API client could not be built.
    #[error("Upstream client error: {message}")]
    Upstream {
        /// Error message.
        message: String,
    },

    /// The audit sink could not be built.
    #[error("Audit sink error: {0}")]
    Audit(#[from] SinkError),

    /// Logging or metrics failed to initialize.
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// The HTTP server failed.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// A route group is enabled without what it needs.
    #[error("Setup error: {message}")]
    Setup {
        /// Error message.
        message: String,
    },
}

impl AppError {
    /// Creates an identity provider error.
    pub fn identity(message: impl Into<String>) -> Self {
        Self::Identity {
            message: message.into(),
        }
    }

    /// Creates an upstream client error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Creates a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::setup("business routes need an encryption key").to_string(),
            "Setup error: business routes need an encryption key"
        );
        assert_eq!(
            AppError::identity("bad pem").to_string(),
            "Identity provider error: bad pem"
        );
    }

    #[test]
    fn test_from_cipher_error() {
        let err: AppError = CipherError::InvalidKeyLength { actual: 3 }.into();
        assert!(matches!(err, AppError::Cipher(_)));
        assert!(err.to_string().contains("32 bytes"));
    }
}
