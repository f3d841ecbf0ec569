//! CORS (Cross-Origin Resource Sharing) policy.
//!
//! An origin is allowed when it *contains* one of the configured
//! substrings, so `beejek.com` admits `https://www.beejek.com` and
//! `https://admin.beejek.com`. Allowed origins receive the full header set
//! on every response; an allowed `OPTIONS` request is answered directly
//! with an empty 200 and never reaches routing.
//!
//! Disallowed origins get no CORS headers at all and the request proceeds
//! normally.
//!
//! ## Example
//!
//! ```
//! use hermes_middleware::CorsPolicy;
//! use http::Method;
//!
//! let cors = CorsPolicy::new(["example.com"]);
//! assert!(cors.is_allowed("https://app.example.com"));
//! assert!(cors.preflight(Some("https://app.example.com"), &Method::OPTIONS).is_some());
//! assert!(cors.preflight(Some("https://evil.test"), &Method::OPTIONS).is_none());
//! ```

use http::{header, HeaderValue, Method, StatusCode};

use crate::types::{Response, ResponseExt};

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
}

const ALLOWED_METHODS: &str = "GET,PUT,POST,DELETE,OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, Content-Length, X-Requested-With, x-api-key";
const MAX_AGE_SECS: &str = "86400";
const CACHE_CONTROL: &str = "public, max-age=86400";

/// Represents the set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Allow any origin.
    Any,
    /// Allow origins containing any of these substrings.
    Containing(Vec<String>),
}

impl AllowedOrigins {
    /// Checks if an origin is allowed.
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Containing(pieces) => pieces.iter().any(|piece| origin.contains(piece.as_str())),
        }
    }
}

/// The gateway's CORS policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
}

impl CorsPolicy {
    /// Creates a policy from origin substrings.
    ///
    /// Empty entries are ignored; a lone `*` allows any origin.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pieces: Vec<String> = origins
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let origins = if pieces.iter().any(|s| s == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::Containing(pieces)
        };
        Self { origins }
    }

    /// A policy that allows no origin.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            origins: AllowedOrigins::Containing(Vec::new()),
        }
    }

    /// Returns the allowed origins.
    #[must_use]
    pub const fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    /// Checks if an origin is allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.is_allowed(origin)
    }

    /// Answers a pre-flight request.
    ///
    /// Returns `Some` only for `OPTIONS` from an allowed origin.
    #[must_use]
    pub fn preflight(&self, origin: Option<&str>, method: &Method) -> Option<Response> {
        if *method != Method::OPTIONS {
            return None;
        }
        let origin = origin.filter(|o| self.is_allowed(o))?;
        let mut response = Response::empty(StatusCode::OK);
        self.apply(Some(origin), &mut response);
        Some(response)
    }

    /// Adds the CORS headers to a response if the origin is allowed.
    pub fn apply(&self, origin: Option<&str>, response: &mut Response) {
        let Some(origin) = origin.filter(|o| self.is_allowed(o)) else {
            return;
        };
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return;
        };

        let headers = response.headers_mut();
        headers.insert(headers::ALLOW_ORIGIN, origin);
        headers.insert(headers::ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
        headers.insert(headers::ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
        headers.insert(headers::MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substring_matching() {
        let cors = CorsPolicy::new(["https://www.beejek.com", "staging-piece"]);
        assert!(cors.is_allowed("https://www.beejek.com"));
        assert!(cors.is_allowed("https://staging-piece.vercel.app"));
        assert!(!cors.is_allowed("https://beejek.com"));
        assert!(!cors.is_allowed("https://example.com"));
    }

    #[test]
    fn test_empty_entries_ignored() {
        let cors = CorsPolicy::new(["", "  "]);
        assert_eq!(cors.origins(), &AllowedOrigins::Containing(Vec::new()));
        assert!(!cors.is_allowed("https://anything.test"));
    }

    #[test]
    fn test_wildcard_allows_any() {
        let cors = CorsPolicy::new(["*"]);
        assert_eq!(cors.origins(), &AllowedOrigins::Any);
        assert!(cors.is_allowed("https://anything.test"));
    }

    #[test]
    fn test_preflight_allowed_origin() {
        let cors = CorsPolicy::new(["example.com"]);
        let response = cors
            .preflight(Some("https://app.example.com"), &Method::OPTIONS)
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[headers::ALLOW_ORIGIN], "https://app.example.com");
        assert_eq!(headers[headers::ALLOW_METHODS], ALLOWED_METHODS);
        assert_eq!(headers[headers::ALLOW_HEADERS], ALLOWED_HEADERS);
        assert_eq!(headers[headers::MAX_AGE], "86400");
        assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=86400");
        assert_eq!(headers[header::VARY], "origin");
    }

    #[test]
    fn test_preflight_ignored_for_other_cases() {
        let cors = CorsPolicy::new(["example.com"]);
        assert!(cors.preflight(Some("https://app.example.com"), &Method::GET).is_none());
        assert!(cors.preflight(Some("https://evil.test"), &Method::OPTIONS).is_none());
        assert!(cors.preflight(None, &Method::OPTIONS).is_none());
    }

    #[test]
    fn test_apply_only_for_allowed_origin() {
        let cors = CorsPolicy::new(["example.com"]);

        let mut allowed = Response::json(StatusCode::OK, &json!({}));
        cors.apply(Some("https://example.com"), &mut allowed);
        assert!(allowed.headers().contains_key(headers::ALLOW_ORIGIN));

        let mut denied = Response::json(StatusCode::OK, &json!({}));
        cors.apply(Some("https://evil.test"), &mut denied);
        assert!(!denied.headers().contains_key(headers::ALLOW_ORIGIN));

        let mut missing = Response::json(StatusCode::OK, &json!({}));
        cors.apply(None, &mut missing);
        assert!(!missing.headers().contains_key(headers::ALLOW_ORIGIN));
    }
}
