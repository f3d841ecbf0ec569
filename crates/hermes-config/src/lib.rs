//! Typed configuration for the Hermes gateway.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides, including the bare legacy names
//! - Strict parsing (unknown fields are errors)
//! - Layered loading (defaults, file, `.env`, environment)
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("hermes.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! body_limit_bytes = 5242880
//!
//! [auth]
//! api_key_header = "x-api-key"
//! jwt_issuer = "https://identity.example.com"
//!
//! [cors]
//! allowed_origins = ["example.com", "localhost"]
//!
//! [upstream]
//! base_url = "https://graph.facebook.com/v17.0"
//!
//! [audit]
//! endpoint = "http://collector:9000/batch"
//! max_batch = 100
//! max_delay_ms = 5000
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Every key can be set with `HERMES__SECTION__KEY`, e.g.
//! `HERMES__AUDIT__MAX_BATCH=50` or `HERMES__TELEMETRY__LOGGING__LEVEL=debug`.
//! `API_KEY`, `ENCRYPTION_KEY`, `WHATSAPP_SYS_USER_ACCESS_TOKEN` and `PORT`
//! are also read; prefixed variables take precedence over them.

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, LEGACY_VARS};
pub use schema::{
    AuditConfig, AuthConfig, CorsConfig, CryptoConfig, LogFormat, LoggingConfig, MetricsConfig,
    RoutesConfig, ServerConfig, TelemetryConfigSection, UpstreamConfig, DEFAULT_BODY_LIMIT_BYTES,
};
