//! Authentication strategies.
//!
//! Each route picks one [`AuthStrategy`] through configuration. A strategy
//! inspects the request headers and returns the caller's
//! [`CallerIdentity`] or a 401 [`GatewayError`]. New variants are new
//! implementations of the trait; the pipeline does not change.
//!
//! | Strategy                  | Credential                      |
//! |---------------------------|---------------------------------|
//! | [`StaticKeyStrategy`]     | shared secret in `x-api-key`    |
//! | [`BearerIdentityStrategy`]| `Authorization: Bearer <token>` |

use std::collections::HashMap;
use std::sync::Arc;

use hermes_core::{BoxFuture, CallerIdentity, GatewayError, GatewayResult};
use http::header;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::types::Request;

/// Default header carrying the static key.
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Message for a request without an `Authorization` header.
pub const BEARER_REQUIRED_MESSAGE: &str = "Authorization token required to access this route";

/// Message for a malformed `Authorization` header.
pub const BEARER_INVALID_MESSAGE: &str = "Authorization token is invalid";

/// Verifies the caller of a request.
pub trait AuthStrategy: Send + Sync + 'static {
    /// Returns the strategy name, used in logs.
    fn name(&self) -> &'static str;

    /// Verifies the request's credential.
    fn verify<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, GatewayResult<CallerIdentity>>;
}

/// Compares a header against a configured shared secret in constant time.
///
/// # Example
///
/// ```
/// use hermes_middleware::auth::StaticKeyStrategy;
///
/// let strategy = StaticKeyStrategy::new("s3cret").with_header("x-admin-key");
/// assert_eq!(strategy.header(), "x-admin-key");
/// ```
#[derive(Clone)]
pub struct StaticKeyStrategy {
    header: String,
    secret: String,
}

impl StaticKeyStrategy {
    /// Creates a strategy reading the default `x-api-key` header.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            header: DEFAULT_API_KEY_HEADER.to_string(),
            secret: secret.into(),
        }
    }

    /// Reads the key from a different header.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into().to_ascii_lowercase();
        self
    }

    /// Returns the header name.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }

    fn check(&self, request: &Request) -> GatewayResult<CallerIdentity> {
        let presented = request
            .headers()
            .get(self.header.as_str())
            .map(http::HeaderValue::as_bytes)
            .filter(|value| !value.is_empty());

        let Some(presented) = presented else {
            return Err(GatewayError::auth(format!(
                "{} required to access this route",
                self.header
            )));
        };

        if bool::from(presented.ct_eq(self.secret.as_bytes())) && !self.secret.is_empty() {
            Ok(CallerIdentity::api_key(&self.header))
        } else {
            Err(GatewayError::auth(format!("{} is invalid", self.header)))
        }
    }
}

impl std::fmt::Debug for StaticKeyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyStrategy")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl AuthStrategy for StaticKeyStrategy {
    fn name(&self) -> &'static str {
        "static_key"
    }

    fn verify<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, GatewayResult<CallerIdentity>> {
        Box::pin(async move { self.check(request) })
    }
}

/// Verifies bearer tokens and turns them into identities.
///
/// A rejection carries a human-readable reason that is returned to the
/// caller.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Verifies a bearer token.
    fn verify_token<'a>(&'a self, token: &'a str)
        -> BoxFuture<'a, Result<CallerIdentity, String>>;
}

/// Extracts a bearer token and delegates verification to an
/// [`IdentityProvider`].
#[derive(Clone)]
pub struct BearerIdentityStrategy {
    provider: Arc<dyn IdentityProvider>,
}

impl BearerIdentityStrategy {
    /// Creates a strategy backed by the given provider.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for BearerIdentityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerIdentityStrategy").finish_non_exhaustive()
    }
}

/// Parses `Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl AuthStrategy for BearerIdentityStrategy {
    fn name(&self) -> &'static str {
        "bearer_identity"
    }

    fn verify<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, GatewayResult<CallerIdentity>> {
        Box::pin(async move {
            let Some(value) = request.headers().get(header::AUTHORIZATION) else {
                return Err(GatewayError::auth(BEARER_REQUIRED_MESSAGE));
            };
            let token = value
                .to_str()
                .ok()
                .and_then(bearer_token)
                .ok_or_else(|| GatewayError::auth(BEARER_INVALID_MESSAGE))?;

            self.provider.verify_token(token).await.map_err(|reason| {
                tracing::debug!(reason = %reason, "bearer token rejected");
                GatewayError::auth(reason)
            })
        })
    }
}

/// Verifies bearer tokens as JWTs.
///
/// Supports HS256 with a shared secret or RS256 with a PEM public key. The
/// decoded claims become the identity; `sub` is required.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Creates a provider verifying HS256 tokens with a shared secret.
    #[must_use]
    pub fn hs256(secret: &[u8]) -> Self {
        Self::with_key(DecodingKey::from_secret(secret), Algorithm::HS256)
    }

    /// Creates a provider verifying RS256 tokens with a PEM public key.
    pub fn rs256_pem(pem: &[u8]) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self::with_key(DecodingKey::from_rsa_pem(pem)?, Algorithm::RS256))
    }

    fn with_key(key: DecodingKey, algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        Self { key, validation }
    }

    /// Requires the `iss` claim to match.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    /// Requires the `aud` claim to match.
    #[must_use]
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.validation.set_audience(&[audience]);
        self.validation.validate_aud = true;
        self
    }

    fn decode(&self, token: &str) -> Result<CallerIdentity, String> {
        let data = jsonwebtoken::decode::<Value>(token, &self.key, &self.validation)
            .map_err(|e| e.to_string())?;
        let subject = data
            .claims
            .get("sub")
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| "token has no subject".to_string())?
            .to_string();
        Ok(CallerIdentity::user(subject, data.claims))
    }
}

impl std::fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for JwtIdentityProvider {
    fn verify_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, String>> {
        Box::pin(async move { self.decode(token) })
    }
}

/// An in-memory token table.
///
/// Useful for local development and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticIdentityProvider {
    /// Creates an empty table; every token is rejected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `token` as `identity`.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, identity: CallerIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn verify_token<'a>(
        &'a self,
        token: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, String>> {
        Box::pin(async move {
            self.tokens
                .get(token)
                .cloned()
                .ok_or_else(|| "token is not recognised".to_string())
        })
    }
}
