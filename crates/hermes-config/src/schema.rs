//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default request body limit: 5 MiB.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 5 * 1024 * 1024;

/// Server configuration section.
///
/// # Example
///
/// ```
/// use hermes_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "0.0.0.0:8080".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.body_limit_bytes, 5 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Upper bound for reading the body and running the pipeline.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Keep-alive for HTTP/1.1 connections.
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
            keep_alive: true,
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT_BYTES
}

fn default_true() -> bool {
    true
}

/// Authentication configuration section.
///
/// `api_key` guards the operational routes. The `jwt_*` keys configure the
/// identity provider behind bearer-token routes; one of `jwt_secret` or
/// `jwt_public_key_pem` is required when business routes are enabled.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Shared secret for the static-key strategy.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Header carrying the shared secret.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// HS256 secret for bearer tokens.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// RS256 public key (PEM) for bearer tokens.
    #[serde(default)]
    pub jwt_public_key_pem: Option<String>,

    /// Expected `iss` claim.
    #[serde(default)]
    pub jwt_issuer: Option<String>,

    /// Expected `aud` claim.
    #[serde(default)]
    pub jwt_audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_header: default_api_key_header(),
            jwt_secret: None,
            jwt_public_key_pem: None,
            jwt_issuer: None,
            jwt_audience: None,
        }
    }
}

impl AuthConfig {
    /// Returns `true` if bearer tokens can be verified.
    #[must_use]
    pub fn has_identity_provider(&self) -> bool {
        self.jwt_secret.as_deref().is_some_and(|s| !s.is_empty())
            || self.jwt_public_key_pem.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("api_key_header", &self.api_key_header)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[redacted]"))
            .field("jwt_public_key_pem", &self.jwt_public_key_pem.is_some())
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .finish()
    }
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

/// Token cipher configuration section.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CryptoConfig {
    /// AES-256 key; exactly 32 bytes.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// CORS configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Origin substrings; an origin containing any of them is allowed.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Upstream Graph API configuration section.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Versioned Graph API base URL.
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,

    /// System-user token used for `debug_token` calls.
    #[serde(default)]
    pub system_user_token: Option<String>,

    /// Per-call timeout.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            system_user_token: None,
            timeout_ms: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Returns the call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field(
                "system_user_token",
                &self.system_user_token.as_ref().map(|_| "[redacted]"),
            )
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn default_upstream_base_url() -> String {
    "https://graph.facebook.com/v17.0".to_string()
}

fn default_upstream_timeout() -> u64 {
    10000
}

/// Audit transport configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Collector URL; records go to the log stream when unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Records per batch.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Maximum time a record waits before its batch is flushed.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Queue capacity between request tasks and the audit worker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Delivery attempts per batch.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_batch: default_max_batch(),
            max_delay_ms: default_max_delay(),
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_batch() -> usize {
    100
}

fn default_max_delay() -> u64 {
    5000
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

/// Route groups to mount.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutesConfig {
    /// `/system/*` operational routes.
    #[serde(default = "default_true")]
    pub system: bool,

    /// `/messages/*`, `/phoneNumbers/*`, `/templates/*` and `/merchant/*`.
    #[serde(default = "default_true")]
    pub business: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            system: true,
            business: true,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directives (trace, debug, info, warn, error, or per-target).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name used in log lines, audit records and `/ping`.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            metrics: MetricsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "hermes".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.http_addr, "0.0.0.0:8080");
        assert_eq!(server.body_limit_bytes, DEFAULT_BODY_LIMIT_BYTES);

        let audit = AuditConfig::default();
        assert_eq!(audit.max_batch, 100);
        assert_eq!(audit.max_delay_ms, 5000);

        assert_eq!(AuthConfig::default().api_key_header, "x-api-key");
        assert_eq!(UpstreamConfig::default().timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("http_adr = \"0.0.0.0:1\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = AuthConfig {
            api_key: Some("super-secret".to_string()),
            jwt_secret: Some("jwt-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("jwt-secret"));

        let crypto = CryptoConfig {
            encryption_key: Some("k".repeat(32)),
        };
        assert!(!format!("{crypto:?}").contains(&"k".repeat(32)));
    }

    #[test]
    fn test_identity_provider_presence() {
        let mut auth = AuthConfig::default();
        assert!(!auth.has_identity_provider());
        auth.jwt_secret = Some(String::new());
        assert!(!auth.has_identity_provider());
        auth.jwt_secret = Some("s".to_string());
        assert!(auth.has_identity_provider());
    }

    #[test]
    fn test_log_format_serde() {
        let config: LoggingConfig = toml::from_str("format = \"pretty\"").unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
