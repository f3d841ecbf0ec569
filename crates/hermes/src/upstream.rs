//! Calls to the WhatsApp Graph API.
//!
//! Handlers describe a call as an [`UpstreamRequest`] and hand it to an
//! [`UpstreamProxy`]. The production proxy is [`GraphClient`]; tests swap in
//! a stub.
//!
//! A non-2xx answer becomes [`GatewayError::Upstream`] carrying the
//! provider's status and payload verbatim, so the caller sees exactly what
//! the provider said. A transport failure has no status and normalizes to
//! 500.

use std::time::Duration;

use hermes_core::{BoxFuture, GatewayError, GatewayResult};
use http::Method;
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

/// A call to the provider.
#[derive(Clone, PartialEq)]
pub struct UpstreamRequest {
    /// HTTP method.
    pub method: Method,
    /// Path below the API base URL, e.g. `/1234567890/messages`.
    pub path: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Provider access token sent as a bearer credential.
    pub access_token: String,
}

impl UpstreamRequest {
    /// Creates a request without query, body or token.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            access_token: String::new(),
        }
    }

    /// Creates a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets the provider access token.
    #[must_use]
    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }
}

impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// Performs provider calls.
pub trait UpstreamProxy: Send + Sync + 'static {
    /// Sends the request and returns the provider's JSON answer.
    fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, GatewayResult<Value>>;
}

/// `reqwest` client for the Graph API.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    /// Creates a client for `base_url` (e.g. `https://graph.facebook.com/v17.0`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| AppError::upstream(format!("failed to create client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the full URL for a path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl UpstreamProxy for GraphClient {
    fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, GatewayResult<Value>> {
        Box::pin(async move {
            let url = self.url(&request.path);
            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .bearer_auth(&request.access_token);
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| {
                tracing::warn!(method = %request.method, path = %request.path, error = %e, "upstream request failed");
                GatewayError::upstream(None, json!({ "message": format!("upstream request failed: {e}") }))
            })?;

            let status = response.status();
            let bytes = response.bytes().await.map_err(|e| {
                GatewayError::upstream(
                    Some(status.as_u16()),
                    json!({ "message": format!("failed to read upstream body: {e}") }),
                )
            })?;
            let payload = parse_payload(&bytes);

            tracing::debug!(
                method = %request.method,
                path = %request.path,
                status = status.as_u16(),
                "upstream call finished"
            );

            if status.is_success() {
                Ok(payload)
            } else {
                Err(GatewayError::upstream(Some(status.as_u16()), payload))
            }
        })
    }
}

/// JSON when possible, otherwise the body as a string; empty is `null`.
fn parse_payload(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
