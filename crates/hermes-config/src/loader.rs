//! Layered configuration loader.
//!
//! Layers, later ones winning: built-in defaults or a preset, a TOML/JSON
//! file, the bare legacy variables (`API_KEY`, `ENCRYPTION_KEY`,
//! `WHATSAPP_SYS_USER_ACCESS_TOKEN`, `PORT`), then `PREFIX__SECTION__KEY`
//! variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, HermesConfig, LogFormat};

/// Bare variable names honored for compatibility with existing deployments.
pub const LEGACY_VARS: [&str; 4] = [
    "API_KEY",
    "ENCRYPTION_KEY",
    "WHATSAPP_SYS_USER_ACCESS_TOKEN",
    "PORT",
];

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use hermes_config::ConfigLoader;
///
/// # fn main() -> Result<(), hermes_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("hermes.toml")?
///     .with_dotenv()?
///     .with_env_prefix("HERMES")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: HermesConfig,
    env_prefix: Option<String>,
    env_vars: Option<BTreeMap<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HermesConfig::default(),
            env_prefix: None,
            env_vars: None,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = HermesConfig::default();
        self
    }

    /// Start with the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = HermesConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = HermesConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [server]
    ///     http_addr = "127.0.0.1:3000"
    ///
    ///     [auth]
    ///     jwt_secret = "secret"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set the prefix for `PREFIX__SECTION__KEY` overrides.
    ///
    /// Setting a prefix also enables the bare legacy variables.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Read overrides from the given variables instead of the process
    /// environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Load a `.env` file into the process environment, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but is malformed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env: {e}"
            ))),
        }
    }

    /// Apply environment overrides, validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or validation
    /// fails.
    pub fn load(self) -> Result<HermesConfig, ConfigError> {
        let config = self.resolve()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides and return the configuration without
    /// validating it.
    ///
    /// Used by tooling that needs a single section, such as the cipher key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed.
    pub fn resolve(mut self) -> Result<HermesConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }
        Ok(self.config)
    }

    fn parse_file(content: &str, path: &Path) -> Result<HermesConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let vars: BTreeMap<String, String> = match self.env_vars.take() {
            Some(vars) => vars,
            None => env::vars().collect(),
        };

        for name in LEGACY_VARS {
            if let Some(value) = vars.get(name) {
                self.apply_legacy_var(name, value)?;
            }
        }

        let scoped = format!("{prefix}__");
        for (key, value) in vars.iter().filter(|(k, _)| k.starts_with(&scoped)) {
            self.apply_env_var(key, value, prefix)?;
        }

        Ok(())
    }

    fn apply_legacy_var(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "API_KEY" => self.config.auth.api_key = non_empty(value),
            "ENCRYPTION_KEY" => self.config.crypto.encryption_key = non_empty(value),
            "WHATSAPP_SYS_USER_ACCESS_TOKEN" => {
                self.config.upstream.system_user_token = non_empty(value);
            }
            "PORT" => {
                let port: u16 = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected port number"))?;
                self.config.server.http_addr = format!("0.0.0.0:{port}");
            }
            _ => {}
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            // Server section
            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = parse_int(key, value)?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = parse_int(key, value)?;
            }
            ["SERVER", "BODY_LIMIT_BYTES"] => {
                self.config.server.body_limit_bytes = parse_int(key, value)?;
            }
            ["SERVER", "KEEP_ALIVE"] => {
                self.config.server.keep_alive = parse_flag(key, value)?;
            }

            // Auth section
            ["AUTH", "API_KEY"] => self.config.auth.api_key = non_empty(value),
            ["AUTH", "API_KEY_HEADER"] => {
                self.config.auth.api_key_header = value.to_ascii_lowercase();
            }
            ["AUTH", "JWT_SECRET"] => self.config.auth.jwt_secret = non_empty(value),
            ["AUTH", "JWT_PUBLIC_KEY_PEM"] => {
                self.config.auth.jwt_public_key_pem = non_empty(value);
            }
            ["AUTH", "JWT_ISSUER"] => self.config.auth.jwt_issuer = non_empty(value),
            ["AUTH", "JWT_AUDIENCE"] => self.config.auth.jwt_audience = non_empty(value),

            // Crypto section
            ["CRYPTO", "ENCRYPTION_KEY"] => {
                self.config.crypto.encryption_key = non_empty(value);
            }

            // CORS section
            ["CORS", "ALLOWED_ORIGINS"] => {
                self.config.cors.allowed_origins = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }

            // Upstream section
            ["UPSTREAM", "BASE_URL"] => {
                self.config.upstream.base_url = value.trim_end_matches('/').to_string();
            }
            ["UPSTREAM", "SYSTEM_USER_TOKEN"] => {
                self.config.upstream.system_user_token = non_empty(value);
            }
            ["UPSTREAM", "TIMEOUT_MS"] => {
                self.config.upstream.timeout_ms = parse_int(key, value)?;
            }

            // Audit section
            ["AUDIT", "ENDPOINT"] => self.config.audit.endpoint = non_empty(value),
            ["AUDIT", "MAX_BATCH"] => self.config.audit.max_batch = parse_int(key, value)?,
            ["AUDIT", "MAX_DELAY_MS"] => {
                self.config.audit.max_delay_ms = parse_int(key, value)?;
            }
            ["AUDIT", "QUEUE_CAPACITY"] => {
                self.config.audit.queue_capacity = parse_int(key, value)?;
            }
            ["AUDIT", "MAX_ATTEMPTS"] => {
                self.config.audit.max_attempts = parse_int(key, value)?;
            }

            // Routes section
            ["ROUTES", "SYSTEM"] => self.config.routes.system = parse_flag(key, value)?,
            ["ROUTES", "BUSINESS"] => self.config.routes.business = parse_flag(key, value)?,

            // Telemetry section
            ["TELEMETRY", "SERVICE_NAME"] => {
                self.config.telemetry.service_name = value.to_string();
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => {
                self.config.telemetry.metrics.addr = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = parse_flag(key, value)?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "LOGGING", "INCLUDE_LOCATION"] => {
                self.config.telemetry.logging.include_location = parse_flag(key, value)?;
            }

            // Unknown keys are ignored so unrelated HERMES__ variables don't break startup.
            _ => {}
        }

        Ok(())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
