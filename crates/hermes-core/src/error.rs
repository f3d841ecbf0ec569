//! Error taxonomy and normalization.
//!
//! Every failure inside the pipeline is a [`GatewayError`]. Before the
//! response is formatted the error is normalized into an [`ErrorRecord`], a
//! complete `(status, body)` pair. Normalization is total: it never fails
//! and never panics.
//!
//! | Kind            | Status                          | Body                              |
//! |-----------------|---------------------------------|-----------------------------------|
//! | `Upstream`      | upstream status, fallback 500   | upstream payload verbatim         |
//! | `Validation`    | 400                             | list of [`Violation`]s            |
//! | `Auth`          | 401                             | `{"message": ...}`                |
//! | `RouteNotFound` | 404                             | fixed message                     |
//! | `Configuration` | 500                             | `{"message": ...}`                |
//! | `Unknown`       | 500                             | `{"message": ...}` or raw value   |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::crypto::CipherError;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Body message used when no route matched.
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "The requested resource doesn't exist on this server";

/// Classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The proxied provider rejected the operation.
    Upstream,
    /// Payload failed schema validation.
    Validation,
    /// Missing or invalid credential.
    Auth,
    /// No handler matched the path.
    RouteNotFound,
    /// Operator error: missing schema or required configuration.
    Configuration,
    /// Anything else.
    Unknown,
}

impl ErrorKind {
    /// Returns the status code used when no better information is available.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Auth => StatusCode::UNAUTHORIZED,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::Upstream | Self::Configuration | Self::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending value (empty for the document root).
    pub path: String,
    /// The schema keyword that was violated (e.g. `maxLength`, `required`).
    pub constraint: String,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    pub fn new(
        path: impl Into<String>,
        constraint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            constraint: constraint.into(),
            message: message.into(),
        }
    }
}

/// Standard error type for the gateway pipeline.
///
/// # Example
///
/// ```
/// use hermes_core::{normalize, GatewayError};
/// use http::StatusCode;
///
/// let err = GatewayError::auth("x-api-key is invalid");
/// let record = normalize(&err, None);
/// assert_eq!(record.status_code, StatusCode::UNAUTHORIZED);
/// assert_eq!(record.body["message"], "x-api-key is invalid");
/// ```
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// The upstream provider answered with an error.
    #[error("upstream error (status {status:?}): {body}")]
    Upstream {
        /// HTTP status reported by the provider, if any.
        status: Option<u16>,
        /// Provider payload, passed through verbatim.
        body: Value,
    },

    /// Schema validation failed.
    #[error("validation failed with {} violation(s)", violations.len())]
    Validation {
        /// Every violation found, in validator order.
        violations: Vec<Violation>,
    },

    /// Authentication failed.
    #[error("authentication error: {message}")]
    Auth {
        /// Message returned to the caller.
        message: String,
    },

    /// No route matched.
    #[error("route not found")]
    RouteNotFound,

    /// The gateway is misconfigured.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the fault.
        message: String,
    },

    /// Any other failure.
    #[error("unknown error: {body}")]
    Unknown {
        /// Body returned to the caller.
        body: Value,
    },
}

impl GatewayError {
    /// Creates an upstream error.
    pub fn upstream(status: Option<u16>, body: Value) -> Self {
        Self::Upstream { status, body }
    }

    /// Creates a validation error from a list of violations.
    #[must_use]
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self::Validation { violations }
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a route-not-found error.
    #[must_use]
    pub const fn route_not_found() -> Self {
        Self::RouteNotFound
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an unknown error from a generic error message.
    ///
    /// The body becomes `{"message": ...}`.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            body: json!({ "message": message.into() }),
        }
    }

    /// Creates an unknown error carrying an arbitrary value as its body.
    #[must_use]
    pub fn raw(body: Value) -> Self {
        Self::Unknown { body }
    }

    /// Wraps any error value as an unknown error.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        Self::unknown(error.to_string())
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RouteNotFound => ErrorKind::RouteNotFound,
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Returns the inferred HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Upstream {
                status: Some(code), ..
            } => StatusCode::from_u16(*code)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            other => other.kind().default_status_code(),
        }
    }

    /// Returns the body presented to the caller.
    #[must_use]
    pub fn body(&self) -> Value {
        match self {
            Self::Upstream { body, .. } | Self::Unknown { body } => body.clone(),
            Self::Validation { violations } => {
                serde_json::to_value(violations).unwrap_or_else(|_| Value::Array(Vec::new()))
            }
            Self::Auth { message } | Self::Configuration { message } => {
                json!({ "message": message })
            }
            Self::RouteNotFound => json!({ "message": ROUTE_NOT_FOUND_MESSAGE }),
        }
    }
}

impl From<CipherError> for GatewayError {
    fn from(error: CipherError) -> Self {
        Self::unknown(error.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(error: serde_json::Error) -> Self {
        Self::unknown(error.to_string())
    }
}

/// A normalized error: the status and body that will be sent to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// Final HTTP status.
    pub status_code: StatusCode,
    /// Kind of the originating error.
    pub kind: ErrorKind,
    /// Body placed under `error` in the envelope.
    pub body: Value,
}

/// Normalizes an error into a status/body pair.
///
/// An explicit `status_override` always wins over the inferred status.
#[must_use]
pub fn normalize(error: &GatewayError, status_override: Option<StatusCode>) -> ErrorRecord {
    ErrorRecord {
        status_code: status_override.unwrap_or_else(|| error.status_code()),
        kind: error.kind(),
        body: error.body(),
    }
}
