//! Audit records and the publisher seam.
//!
//! Every request that reaches the response formatter produces at least one
//! [`AuditRecord`]; handlers may publish extra labelled checkpoints. Records
//! are handed to an [`AuditPublisher`], which must never block the caller.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A serialized snapshot of a request context.
///
/// Structured values (`data`, `error`, `identity`, `operationData`) are
/// carried as JSON strings so that the record maps onto flat analytics
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Request identifier.
    pub request_id: String,
    /// Trace identifier.
    pub trace_id: String,
    /// When the request was received.
    pub received_at: DateTime<Utc>,
    /// Client address.
    pub client_address: String,
    /// Host name without port.
    pub host_name: String,
    /// HTTP method.
    pub method: String,
    /// Sub-path below the mount path.
    pub path: String,
    /// First path segment.
    pub mount_path: String,
    /// JSON-serialized request body.
    pub body: String,
    /// JSON-serialized request headers.
    pub headers: String,
    /// JSON-serialized path parameters.
    pub params: String,
    /// JSON-serialized query parameters.
    pub query: String,
    /// Whether a route matched.
    pub is_valid_route: bool,
    /// Response status code.
    pub status_code: u16,
    /// JSON-stringified success payload.
    pub data: Option<String>,
    /// JSON-stringified error body.
    pub error: Option<String>,
    /// JSON-stringified caller identity.
    pub identity: String,
    /// Name of the service that produced the record.
    pub service_name: String,
    /// Checkpoint label, for intermediate publishes.
    pub operation_name: Option<String>,
    /// JSON-stringified checkpoint payload.
    pub operation_data: Option<String>,
    /// Per-request publish counter, starting at 1.
    pub sequence_number: u64,
    /// Processing time, once the response has been formatted.
    pub processing_duration_ms: Option<u64>,
}

/// Reasons a record could not be handed off.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The queue is at capacity; the record was dropped.
    #[error("audit queue is full")]
    QueueFull,

    /// The background consumer has stopped.
    #[error("audit queue is closed")]
    Closed,
}

/// Destination for audit records.
///
/// `publish` is called on the request path and must return immediately.
/// Implementations buffer or drop; they never wait on I/O.
pub trait AuditPublisher: Send + Sync + std::fmt::Debug {
    /// Enqueues a record for delivery.
    fn publish(&self, record: AuditRecord) -> Result<(), PublishError>;
}

/// A publisher that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl AuditPublisher for NoopPublisher {
    fn publish(&self, _record: AuditRecord) -> Result<(), PublishError> {
        Ok(())
    }
}

/// A publisher that keeps records in memory.
///
/// Used by tests to observe what the pipeline published.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryPublisher {
    /// Creates an empty publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record published so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    /// Returns the number of records published so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing has been published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditPublisher for MemoryPublisher {
    fn publish(&self, record: AuditRecord) -> Result<(), PublishError> {
        self.records.lock().push(record);
        Ok(())
    }
}
