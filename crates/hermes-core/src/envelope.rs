//! The uniform JSON response envelope.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ROUTE_NOT_FOUND_MESSAGE;
use crate::status::reason_phrase;

/// The `status` block of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBlock {
    /// HTTP status code.
    pub code: u16,
    /// Reason phrase from the status table.
    pub message: String,
    /// Present only for error responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Processing time; absent for unrouted requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_in_ms: Option<u64>,
}

impl StatusBlock {
    fn new(status: StatusCode) -> Self {
        Self {
            code: status.as_u16(),
            message: reason_phrase(status.as_u16()).to_string(),
            trace_id: None,
            processed_in_ms: None,
        }
    }
}

/// `{ status, data?, error? }`
///
/// # Example
///
/// ```
/// use hermes_core::ResponseEnvelope;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let envelope = ResponseEnvelope::success(StatusCode::OK, Some(json!({"id": "wamid.1"})), 42);
/// let body = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(body["status"]["message"], "OK");
/// assert_eq!(body["status"]["processedInMs"], 42);
/// assert!(body["status"].get("traceId").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Status block.
    pub status: StatusBlock,
    /// Success payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Normalized error body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponseEnvelope {
    /// Builds a success envelope.
    #[must_use]
    pub fn success(status: StatusCode, data: Option<Value>, processed_in_ms: u64) -> Self {
        let mut block = StatusBlock::new(status);
        block.processed_in_ms = Some(processed_in_ms);
        Self {
            status: block,
            data,
            error: None,
        }
    }

    /// Builds an error envelope; the trace id is always included.
    #[must_use]
    pub fn failure(
        status: StatusCode,
        trace_id: impl Into<String>,
        error: Value,
        processed_in_ms: u64,
    ) -> Self {
        let mut block = StatusBlock::new(status);
        block.trace_id = Some(trace_id.into());
        block.processed_in_ms = Some(processed_in_ms);
        Self {
            status: block,
            data: None,
            error: Some(error),
        }
    }

    /// The fixed envelope for unrouted requests: no timing, no trace id.
    #[must_use]
    pub fn route_not_found() -> Self {
        Self {
            status: StatusBlock::new(StatusCode::NOT_FOUND),
            data: None,
            error: Some(json!({ "message": ROUTE_NOT_FOUND_MESSAGE })),
        }
    }

    /// Returns the status code carried by the envelope.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
