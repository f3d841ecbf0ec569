//! Root configuration type.

use std::net::SocketAddr;
use std::time::Duration;

use hermes_core::crypto::KEY_LEN;
use serde::{Deserialize, Serialize};

use crate::{
    AuditConfig, AuthConfig, ConfigError, CorsConfig, CryptoConfig, LogFormat, RoutesConfig,
    ServerConfig, TelemetryConfigSection, UpstreamConfig,
};

/// Complete gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.auth.api_key_header, "x-api-key");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication secrets and identity provider.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Token cipher key.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// CORS origins.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Graph API client.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Audit transport.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Route groups to mount.
    #[serde(default)]
    pub routes: RoutesConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl HermesConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the server or metrics address is not a socket address
    /// - the encryption key is set but not exactly 32 bytes
    /// - an audit batch parameter is zero
    /// - business routes are enabled without identity provider key material
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)?;

        if self.telemetry.metrics.enabled {
            parse_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        if let Some(key) = &self.crypto.encryption_key {
            if key.len() != KEY_LEN {
                return Err(ConfigError::invalid_value(
                    "crypto.encryption_key",
                    format!("must be exactly {KEY_LEN} bytes, got {}", key.len()),
                ));
            }
        }

        if self.server.body_limit_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.body_limit_bytes",
                "must be greater than zero",
            ));
        }

        if self.audit.max_batch == 0 {
            return Err(ConfigError::invalid_value(
                "audit.max_batch",
                "must be greater than zero",
            ));
        }
        if self.audit.queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "audit.queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.audit.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "audit.max_attempts",
                "must be greater than zero",
            ));
        }

        if self.routes.business && !self.auth.has_identity_provider() {
            return Err(ConfigError::missing_field(
                "auth.jwt_secret (or auth.jwt_public_key_pem)",
            ));
        }

        Ok(())
    }

    /// Parsed server bind address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unparsable address.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        parse_addr("server.http_addr", &self.server.http_addr)
    }

    /// Development preset: pretty debug logs.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::HermesConfig;
    ///
    /// let config = HermesConfig::development();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.cors.allowed_origins = vec!["localhost".to_string()];
        config
    }

    /// Production preset: JSON logs and the metrics exporter.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::{HermesConfig, LogFormat};
    ///
    /// let config = HermesConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config
    }

    /// Converts the telemetry section into runtime telemetry settings.
    #[must_use]
    pub fn to_telemetry_config(&self) -> hermes_telemetry::TelemetryConfig {
        let section = &self.telemetry;
        hermes_telemetry::TelemetryConfig {
            service_name: section.service_name.clone(),
            logging: hermes_telemetry::LogConfig {
                enabled: section.logging.enabled,
                level: section.logging.level.clone(),
                format: match section.logging.format {
                    LogFormat::Json => hermes_telemetry::LogFormat::Json,
                    LogFormat::Pretty => hermes_telemetry::LogFormat::Pretty,
                },
                file_line_info: section.logging.include_location,
                include_target: true,
            },
            metrics: hermes_telemetry::MetricsConfig {
                enabled: section.metrics.enabled,
                addr: section.metrics.addr.clone(),
            },
        }
    }

    /// Converts the audit section into batching publisher settings.
    #[must_use]
    pub fn to_batch_config(&self) -> hermes_telemetry::BatchConfig {
        hermes_telemetry::BatchConfig {
            max_batch: self.audit.max_batch,
            max_delay: Duration::from_millis(self.audit.max_delay_ms),
            queue_capacity: self.audit.queue_capacity,
            max_attempts: self.audit.max_attempts,
            ..hermes_telemetry::BatchConfig::default()
        }
    }
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> HermesConfig {
        let mut config = HermesConfig::default();
        config.auth.jwt_secret = Some("jwt-secret".to_string());
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_business_routes_need_identity_provider() {
        let config = HermesConfig::default();
        match config.validate() {
            Err(ConfigError::MissingField { field }) => assert!(field.starts_with("auth.jwt_secret")),
            other => panic!("expected missing field, got {other:?}"),
        }

        let mut config = HermesConfig::default();
        config.routes.business = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let mut config = valid();
        config.server.http_addr = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "server.http_addr"
        ));
    }

    #[test]
    fn test_metrics_addr_checked_only_when_enabled() {
        let mut config = valid();
        config.telemetry.metrics.addr = "nowhere".to_string();
        assert!(config.validate().is_ok());

        config.telemetry.metrics.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_encryption_key_length() {
        let mut config = valid();
        config.crypto.encryption_key = Some("short".to_string());
        assert!(config.validate().is_err());

        config.crypto.encryption_key = Some("k".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_parameters_rejected() {
        let mut config = valid();
        config.audit.max_batch = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.audit.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.audit.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let dev = HermesConfig::development();
        assert_eq!(dev.telemetry.logging.format, LogFormat::Pretty);
        assert!(dev.telemetry.logging.include_location);

        let prod = HermesConfig::production();
        assert_eq!(prod.telemetry.logging.format, LogFormat::Json);
        assert!(prod.telemetry.metrics.enabled);
    }

    #[test]
    fn test_runtime_conversions() {
        let mut config = HermesConfig::development();
        config.audit.max_delay_ms = 250;
        config.audit.max_batch = 7;

        let telemetry = config.to_telemetry_config();
        assert_eq!(telemetry.service_name, "hermes");
        assert_eq!(telemetry.logging.format, hermes_telemetry::LogFormat::Pretty);
        assert!(telemetry.logging.file_line_info);

        let batch = config.to_batch_config();
        assert_eq!(batch.max_batch, 7);
        assert_eq!(batch.max_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_json_roundtrip_keeps_sections() {
        let config = valid();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: HermesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
