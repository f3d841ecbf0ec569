//! Request context types.
//!
//! The [`RequestContext`] is created once per inbound request, before any
//! stage runs, and is passed by `&mut` through authentication, validation,
//! the handler and the response formatter. It is dropped once the response
//! has been produced.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{header, request::Parts, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::{AuditPublisher, AuditRecord};
use crate::error::ErrorRecord;
use crate::identity::CallerIdentity;

/// Header carrying a caller-supplied trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header carrying the original client address behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Headers whose values are replaced before they reach the audit trail.
const REDACTED_HEADERS: &[&str] = &["authorization", "x-api-key", "cookie"];

const REDACTED: &str = "[redacted]";

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps audit records sortable by id.
///
/// # Example
///
/// ```
/// use hermes_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A named intermediate checkpoint recorded by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSnapshot {
    /// Checkpoint label, e.g. `debugTokenCall`.
    pub name: String,
    /// Payload captured at the checkpoint.
    pub data: Value,
    /// Sequence number of the audit record published for this checkpoint.
    pub sequence_number: u64,
    /// When the checkpoint was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Per-request state that flows through the pipeline.
///
/// Identity and diagnostic fields are captured at construction and never
/// change afterwards. The outcome (`result` or `error`) is recorded at most
/// once; later attempts are ignored with a warning.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use hermes_core::RequestContext;
///
/// let request = http::Request::builder()
///     .method("POST")
///     .uri("/messages/text")
///     .header("x-trace-id", "trace-123")
///     .body(())
///     .unwrap();
/// let (parts, ()) = request.into_parts();
///
/// let ctx = RequestContext::from_parts(&parts, &Bytes::from_static(b"{}"), None, Default::default());
/// assert_eq!(ctx.trace_id(), "trace-123");
/// assert_eq!(ctx.mount_path(), "/messages");
/// assert_eq!(ctx.route_key(), "messages/text");
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    trace_id: String,
    received_at: DateTime<Utc>,
    started_at: Instant,

    client_address: String,
    host_name: String,
    method: Method,
    path: String,
    mount_path: String,

    raw_body: String,
    raw_headers: String,
    raw_params: String,
    raw_query: String,
    body: Value,
    query: Map<String, Value>,
    params: BTreeMap<String, String>,

    is_valid_route: bool,
    result: Option<Value>,
    error: Option<ErrorRecord>,
    status_code: StatusCode,
    identity: CallerIdentity,

    operation_log: Vec<OperationSnapshot>,
    sequence_number: u64,
    processing_duration_ms: Option<u64>,

    service_name: String,
    audit: Option<Arc<dyn AuditPublisher>>,
}

impl RequestContext {
    /// Creates a context from the request head, the collected body, the peer
    /// address and the path parameters extracted by the router.
    #[must_use]
    pub fn from_parts(
        parts: &Parts,
        body: &Bytes,
        remote_addr: Option<SocketAddr>,
        params: BTreeMap<String, String>,
    ) -> Self {
        let request_id = RequestId::new();
        let trace_id = header_str(parts, TRACE_ID_HEADER)
            .filter(|value| !value.is_empty())
            .map_or_else(|| request_id.to_string(), str::to_string);

        let client_address = header_str(parts, FORWARDED_FOR_HEADER)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| remote_addr.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let host_name = header_str(parts, header::HOST.as_str())
            .or_else(|| parts.uri.host())
            .map(|host| host.split(':').next().unwrap_or(host).to_string())
            .unwrap_or_default();

        let (mount_path, path) = split_mount(parts.uri.path());

        let body = parse_body(parts, body);
        let query = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .map(collect_pairs)
            .unwrap_or_default();

        Self {
            request_id,
            trace_id,
            received_at: Utc::now(),
            started_at: Instant::now(),
            client_address,
            host_name,
            method: parts.method.clone(),
            path,
            mount_path,
            raw_body: body.to_string(),
            raw_headers: headers_snapshot(parts).to_string(),
            raw_params: serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string()),
            raw_query: Value::Object(query.clone()).to_string(),
            body,
            query,
            params,
            is_valid_route: true,
            result: None,
            error: None,
            status_code: StatusCode::OK,
            identity: CallerIdentity::Anonymous,
            operation_log: Vec::new(),
            sequence_number: 1,
            processing_duration_ms: None,
            service_name: String::new(),
            audit: None,
        }
    }

    /// Creates a context for a bare `GET /` request.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_core::RequestContext;
    ///
    /// let ctx = RequestContext::mock();
    /// assert!(ctx.is_valid_route());
    /// ```
    #[must_use]
    pub fn mock() -> Self {
        let (parts, ()) = http::Request::new(()).into_parts();
        Self::from_parts(&parts, &Bytes::new(), None, BTreeMap::new())
    }

    /// Sets the service name included in audit records.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Attaches the audit publisher.
    #[must_use]
    pub fn with_audit_publisher(mut self, publisher: Arc<dyn AuditPublisher>) -> Self {
        self.audit = Some(publisher);
        self
    }

    /// Redacts an additional header in the audit snapshot, e.g. a
    /// configured static-key header.
    #[must_use]
    pub fn with_redacted_header(mut self, name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if let Ok(Value::Object(mut headers)) = serde_json::from_str::<Value>(&self.raw_headers) {
            if let Some(value) = headers.get_mut(&name) {
                *value = Value::String(REDACTED.to_string());
                self.raw_headers = Value::Object(headers).to_string();
            }
        }
        self
    }

    /// Returns a new context with the specified identity.
    #[must_use]
    pub fn with_identity(mut self, identity: CallerIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the trace ID: the `x-trace-id` header when supplied, else the
    /// request ID.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Returns when the request was received.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Returns the elapsed time since the request was received.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the client address.
    #[must_use]
    pub fn client_address(&self) -> &str {
        &self.client_address
    }

    /// Returns the host name, without port.
    #[must_use]
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the sub-path below the mount path, e.g. `/text`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the first path segment, e.g. `/messages`.
    #[must_use]
    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Returns the schema registry key for this request, e.g. `messages/text`.
    #[must_use]
    pub fn route_key(&self) -> String {
        format!("{}{}", self.mount_path.trim_start_matches('/'), self.path)
    }

    /// Returns the parsed request body.
    ///
    /// An empty body is an empty object. A body that is neither JSON nor
    /// form-urlencoded is kept as a JSON string.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Returns the parsed query. Repeated keys become arrays.
    #[must_use]
    pub const fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    /// Returns the path parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Returns a single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the JSON snapshot of the body.
    #[must_use]
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// Returns the JSON snapshot of the headers, with credentials redacted.
    #[must_use]
    pub fn raw_headers(&self) -> &str {
        &self.raw_headers
    }

    /// Returns the JSON snapshot of the path parameters.
    #[must_use]
    pub fn raw_params(&self) -> &str {
        &self.raw_params
    }

    /// Returns the JSON snapshot of the query.
    #[must_use]
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    /// Returns `false` once routing has failed to match.
    #[must_use]
    pub const fn is_valid_route(&self) -> bool {
        self.is_valid_route
    }

    /// Marks the request as unrouted.
    pub fn mark_route_not_found(&mut self) {
        self.is_valid_route = false;
    }

    /// Returns the success payload, if recorded.
    #[must_use]
    pub const fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error record, if recorded.
    #[must_use]
    pub const fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    /// Returns `true` if either a result or an error has been recorded.
    #[must_use]
    pub const fn has_outcome(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }

    /// Records the success payload.
    ///
    /// Returns `false` (and leaves the context untouched) if an outcome was
    /// already recorded.
    pub fn set_result(&mut self, value: Value) -> bool {
        if self.has_outcome() {
            tracing::warn!(
                request_id = %self.request_id,
                "outcome already recorded, ignoring result"
            );
            return false;
        }
        self.result = Some(value);
        true
    }

    /// Records a normalized error and adopts its status code.
    ///
    /// A status outside the 4xx/5xx range is replaced with 500. Returns
    /// `false` if an outcome was already recorded.
    pub fn fail(&mut self, mut record: ErrorRecord) -> bool {
        if self.has_outcome() {
            tracing::warn!(
                request_id = %self.request_id,
                kind = ?record.kind,
                "outcome already recorded, ignoring error"
            );
            return false;
        }
        if !(record.status_code.is_client_error() || record.status_code.is_server_error()) {
            record.status_code = StatusCode::INTERNAL_SERVER_ERROR;
        }
        self.status_code = record.status_code;
        self.error = Some(record);
        true
    }

    /// Returns the response status code.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Sets the status code for a successful response.
    ///
    /// Ignored once an error has been recorded.
    pub fn set_status_code(&mut self, status: StatusCode) {
        if self.error.is_none() {
            self.status_code = status;
        }
    }

    /// Returns the caller identity.
    #[must_use]
    pub const fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    /// Sets the caller identity.
    pub fn set_identity(&mut self, identity: CallerIdentity) {
        self.identity = identity;
    }

    /// Returns the labelled checkpoints recorded so far.
    #[must_use]
    pub fn operation_log(&self) -> &[OperationSnapshot] {
        &self.operation_log
    }

    /// Returns the sequence number the next audit record will carry.
    #[must_use]
    pub const fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Returns the processing time, once recorded.
    #[must_use]
    pub const fn processing_duration_ms(&self) -> Option<u64> {
        self.processing_duration_ms
    }

    /// Records the processing time and returns it in milliseconds.
    pub fn finish(&mut self) -> u64 {
        let millis = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.processing_duration_ms = Some(millis);
        millis
    }

    /// Returns the service name.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Serializes the context into an audit record.
    #[must_use]
    pub fn to_audit_record(&self, label: Option<&str>, extra: Option<&Value>) -> AuditRecord {
        self.record_with_sequence(label, extra, self.sequence_number)
    }

    fn record_with_sequence(
        &self,
        label: Option<&str>,
        extra: Option<&Value>,
        sequence_number: u64,
    ) -> AuditRecord {
        AuditRecord {
            request_id: self.request_id.to_string(),
            trace_id: self.trace_id.clone(),
            received_at: self.received_at,
            client_address: self.client_address.clone(),
            host_name: self.host_name.clone(),
            method: self.method.to_string(),
            path: self.path.clone(),
            mount_path: self.mount_path.clone(),
            body: self.raw_body.clone(),
            headers: self.raw_headers.clone(),
            params: self.raw_params.clone(),
            query: self.raw_query.clone(),
            is_valid_route: self.is_valid_route,
            status_code: self.status_code.as_u16(),
            data: self.result.as_ref().map(Value::to_string),
            error: self.error.as_ref().map(|record| record.body.to_string()),
            identity: serde_json::to_string(&self.identity)
                .unwrap_or_else(|_| "null".to_string()),
            service_name: self.service_name.clone(),
            operation_name: label.map(str::to_string),
            operation_data: extra.map(Value::to_string),
            sequence_number,
            processing_duration_ms: self.processing_duration_ms,
        }
    }

    /// Writes a structured snapshot of the context to the operational log.
    pub fn log_to_diagnostics(&self) {
        let record = self.to_audit_record(None, None);
        let snapshot = serde_json::to_string(&record).unwrap_or_default();
        let route = self.route_key();
        let status = self.status_code.as_u16();

        if self.status_code.is_server_error() {
            tracing::error!(
                request_id = %self.request_id,
                trace_id = %self.trace_id,
                route = %route,
                status,
                context = %snapshot,
                "request context"
            );
        } else if self.status_code.is_client_error() {
            tracing::warn!(
                request_id = %self.request_id,
                trace_id = %self.trace_id,
                route = %route,
                status,
                context = %snapshot,
                "request context"
            );
        } else {
            tracing::info!(
                request_id = %self.request_id,
                trace_id = %self.trace_id,
                route = %route,
                status,
                context = %snapshot,
                "request context"
            );
        }
    }

    /// Hands a serialized snapshot to the audit publisher without waiting.
    ///
    /// A labelled publish is an intermediate checkpoint: it is also appended
    /// to the operation log. Each publish consumes one sequence number.
    /// Failures are logged and never reach the caller.
    pub fn publish_audit(&mut self, label: Option<&str>, extra: Option<Value>) {
        let sequence_number = self.sequence_number;
        self.sequence_number += 1;

        if let Some(name) = label {
            self.operation_log.push(OperationSnapshot {
                name: name.to_string(),
                data: extra.clone().unwrap_or(Value::Null),
                sequence_number,
                recorded_at: Utc::now(),
            });
        }

        let Some(publisher) = self.audit.as_ref() else {
            tracing::debug!(request_id = %self.request_id, "no audit publisher attached");
            return;
        };

        let record = self.record_with_sequence(label, extra.as_ref(), sequence_number);
        if let Err(error) = publisher.publish(record) {
            tracing::warn!(
                request_id = %self.request_id,
                sequence_number,
                error = %error,
                "failed to publish audit record"
            );
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::mock()
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

/// Splits the path into mount and sub-path, skipping empty segments the
/// same way the router does.
fn split_mount(path: &str) -> (String, String) {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let mount = format!("/{}", segments.next().unwrap_or_default());
    let rest = segments.collect::<Vec<_>>().join("/");
    (mount, format!("/{rest}"))
}

fn parse_body(parts: &Parts, body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Object(Map::new());
    }

    let is_form = header_str(parts, header::CONTENT_TYPE.as_str())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let parsed = if is_form {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
            .ok()
            .map(|pairs| Value::Object(collect_pairs(pairs)))
    } else {
        serde_json::from_slice(body).ok()
    };

    parsed.unwrap_or_else(|| Value::String(String::from_utf8_lossy(body).into_owned()))
}

fn collect_pairs(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}

fn headers_snapshot(parts: &Parts) -> Value {
    let mut map = Map::new();
    for (name, value) in &parts.headers {
        let value = if REDACTED_HEADERS.contains(&name.as_str()) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(&value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value));
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryPublisher;
    use crate::error::{normalize, GatewayError};
    use serde_json::json;

    fn context(builder: http::request::Builder, body: &'static [u8]) -> RequestContext {
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        RequestContext::from_parts(
            &parts,
            &Bytes::from_static(body),
            Some("192.168.1.7:50000".parse().unwrap()),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_display() {
        let display = RequestId::new().to_string();
        assert_eq!(display.len(), 36, "UUID string should be 36 characters");
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).expect("serialization should work");
        let parsed: RequestId = serde_json::from_str(&json).expect("deserialization should work");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_trace_id_from_header() {
        let ctx = context(
            http::Request::builder().uri("/messages/text").header("x-trace-id", "abc-123"),
            b"",
        );
        assert_eq!(ctx.trace_id(), "abc-123");
        assert_eq!(ctx.trace_id(), ctx.trace_id());
    }

    #[test]
    fn test_trace_id_falls_back_to_request_id() {
        let ctx = context(http::Request::builder().uri("/messages/text"), b"");
        assert_eq!(ctx.trace_id(), ctx.request_id().to_string());
    }

    #[test]
    fn test_empty_trace_header_is_ignored() {
        let ctx = context(
            http::Request::builder().uri("/x").header("x-trace-id", ""),
            b"",
        );
        assert_eq!(ctx.trace_id(), ctx.request_id().to_string());
    }

    #[test]
    fn test_client_address_prefers_forwarded_for() {
        let ctx = context(
            http::Request::builder()
                .uri("/x")
                .header("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
            b"",
        );
        assert_eq!(ctx.client_address(), "203.0.113.9");

        let ctx = context(http::Request::builder().uri("/x"), b"");
        assert_eq!(ctx.client_address(), "192.168.1.7");
    }

    #[test]
    fn test_host_name_strips_port() {
        let ctx = context(
            http::Request::builder().uri("/x").header("host", "api.example.com:8443"),
            b"",
        );
        assert_eq!(ctx.host_name(), "api.example.com");
    }

    #[test]
    fn test_mount_and_sub_path() {
        let ctx = context(http::Request::builder().uri("/templates/viewBy?name=a"), b"");
        assert_eq!(ctx.mount_path(), "/templates");
        assert_eq!(ctx.path(), "/viewBy");
        assert_eq!(ctx.route_key(), "templates/viewBy");

        let ctx = context(http::Request::builder().uri("/ping"), b"");
        assert_eq!(ctx.mount_path(), "/ping");
        assert_eq!(ctx.path(), "/");
    }

    #[test]
    fn test_route_key_ignores_empty_segments() {
        for uri in ["/messages/text/", "/messages//text", "//messages/text"] {
            let ctx = context(http::Request::builder().uri(uri), b"");
            assert_eq!(ctx.mount_path(), "/messages");
            assert_eq!(ctx.path(), "/text");
            assert_eq!(ctx.route_key(), "messages/text");
        }
    }

    #[test]
    fn test_query_repeated_keys_become_arrays() {
        let ctx = context(
            http::Request::builder().uri("/x/y?status=APPROVED&tag=a&tag=b&tag=c"),
            b"",
        );
        assert_eq!(ctx.query()["status"], "APPROVED");
        assert_eq!(ctx.query()["tag"], json!(["a", "b", "c"]));
        assert!(ctx.raw_query().contains("APPROVED"));
    }

    #[test]
    fn test_json_and_form_bodies() {
        let ctx = context(
            http::Request::builder().method("POST").uri("/x/y"),
            br#"{"to":"15551234567"}"#,
        );
        assert_eq!(ctx.body()["to"], "15551234567");

        let ctx = context(
            http::Request::builder()
                .method("POST")
                .uri("/x/y")
                .header("content-type", "application/x-www-form-urlencoded"),
            b"code=123456&language=en",
        );
        assert_eq!(ctx.body(), &json!({"code": "123456", "language": "en"}));
    }

    #[test]
    fn test_empty_and_malformed_bodies() {
        let ctx = context(http::Request::builder().method("POST").uri("/x/y"), b"");
        assert_eq!(ctx.body(), &json!({}));

        let ctx = context(http::Request::builder().method("POST").uri("/x/y"), b"{not json");
        assert_eq!(ctx.body(), &json!("{not json"));
    }

    #[test]
    fn test_credentials_are_redacted_in_header_snapshot() {
        let ctx = context(
            http::Request::builder()
                .uri("/x")
                .header("x-api-key", "s3cret")
                .header("authorization", "Bearer abc")
                .header("user-agent", "curl"),
            b"",
        );
        assert!(!ctx.raw_headers().contains("s3cret"));
        assert!(!ctx.raw_headers().contains("Bearer abc"));
        assert!(ctx.raw_headers().contains("curl"));
    }

    #[test]
    fn test_configured_key_header_is_redacted() {
        let ctx = context(
            http::Request::builder()
                .uri("/system/time")
                .header("x-admin-key", "s3cret")
                .header("user-agent", "curl"),
            b"",
        )
        .with_redacted_header("X-Admin-Key");
        assert!(!ctx.raw_headers().contains("s3cret"));
        assert!(ctx.raw_headers().contains("curl"));

        let record = ctx.to_audit_record(None, None);
        assert!(!record.headers.contains("s3cret"));
    }

    #[test]
    fn test_outcome_is_recorded_once() {
        let mut ctx = RequestContext::mock();
        assert!(ctx.set_result(json!({"id": 1})));
        assert!(!ctx.set_result(json!({"id": 2})));
        assert!(!ctx.fail(normalize(&GatewayError::unknown("late"), None)));

        assert_eq!(ctx.result(), Some(&json!({"id": 1})));
        assert!(ctx.error().is_none());
        assert_eq!(ctx.status_code(), StatusCode::OK);
    }

    #[test]
    fn test_fail_adopts_error_status() {
        let mut ctx = RequestContext::mock();
        assert!(ctx.fail(normalize(&GatewayError::auth("nope"), None)));
        assert_eq!(ctx.status_code(), StatusCode::UNAUTHORIZED);

        ctx.set_status_code(StatusCode::OK);
        assert_eq!(ctx.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_fail_never_records_success_status() {
        let mut ctx = RequestContext::mock();
        ctx.fail(normalize(&GatewayError::unknown("x"), Some(StatusCode::OK)));
        assert_eq!(ctx.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_publish_audit_increments_sequence() {
        let publisher = Arc::new(MemoryPublisher::new());
        let mut ctx = RequestContext::mock()
            .with_service_name("hermes")
            .with_audit_publisher(publisher.clone());
        assert_eq!(ctx.sequence_number(), 1);

        ctx.publish_audit(Some("debugTokenCall"), Some(json!({"wabaId": "123"})));
        ctx.set_result(json!({"wabaId": "123"}));
        ctx.publish_audit(None, None);

        let records = publisher.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence_number, 1);
        assert_eq!(records[0].operation_name.as_deref(), Some("debugTokenCall"));
        assert_eq!(records[0].operation_data.as_deref(), Some(r#"{"wabaId":"123"}"#));
        assert!(records[0].data.is_none());
        assert_eq!(records[1].sequence_number, 2);
        assert_eq!(records[1].data.as_deref(), Some(r#"{"wabaId":"123"}"#));
        assert_eq!(records[1].service_name, "hermes");

        assert_eq!(ctx.operation_log().len(), 1);
        assert_eq!(ctx.operation_log()[0].sequence_number, 1);
        assert_eq!(ctx.sequence_number(), 3);
    }

    #[test]
    fn test_publish_without_publisher_still_counts() {
        let mut ctx = RequestContext::mock();
        ctx.publish_audit(None, None);
        assert_eq!(ctx.sequence_number(), 2);
    }

    #[test]
    fn test_finish_records_duration() {
        let mut ctx = RequestContext::mock();
        std::thread::sleep(Duration::from_millis(5));
        let millis = ctx.finish();
        assert!(millis >= 5);
        assert_eq!(ctx.processing_duration_ms(), Some(millis));
    }

    #[test]
    fn test_identity_is_stringified_in_record() {
        let ctx = RequestContext::mock().with_identity(CallerIdentity::api_key("x-api-key"));
        let record = ctx.to_audit_record(None, None);
        assert!(record.identity.contains("api_key"));
    }
}
