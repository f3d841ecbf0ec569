//! Caller identity attached to a request by an auth strategy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The authenticated identity of the caller.
///
/// A context starts out [`CallerIdentity::Anonymous`]; an auth strategy
/// replaces it once verification succeeds.
///
/// # Example
///
/// ```rust
/// use hermes_core::CallerIdentity;
/// use serde_json::json;
///
/// let identity = CallerIdentity::user("merchant-42", json!({"email": "shop@example.com"}));
/// assert_eq!(identity.log_id(), "user:merchant-42");
/// assert!(identity.is_authenticated());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// No credential has been verified.
    #[default]
    Anonymous,

    /// Caller presented the shared static key.
    ApiKey {
        /// Name of the header that carried the key.
        key_id: String,
    },

    /// Caller presented a bearer token accepted by the identity provider.
    User {
        /// Subject of the token.
        subject: String,
        /// Decoded token claims, verbatim.
        claims: Value,
    },
}

impl CallerIdentity {
    /// Creates a static-key identity.
    pub fn api_key(key_id: impl Into<String>) -> Self {
        Self::ApiKey {
            key_id: key_id.into(),
        }
    }

    /// Creates a user identity from decoded claims.
    pub fn user(subject: impl Into<String>, claims: Value) -> Self {
        Self::User {
            subject: subject.into(),
            claims,
        }
    }

    /// Returns `true` unless the identity is anonymous.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Returns the decoded claims for user identities.
    #[must_use]
    pub const fn claims(&self) -> Option<&Value> {
        match self {
            Self::User { claims, .. } => Some(claims),
            _ => None,
        }
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// Never contains secrets or tokens.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::ApiKey { key_id } => format!("apikey:{key_id}"),
            Self::User { subject, .. } => format!("user:{subject}"),
        }
    }
}
