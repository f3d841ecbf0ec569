//! Response formatting.
//!
//! The formatter is the last step of every routed request and runs exactly
//! once. It turns the outcome recorded on the [`RequestContext`] into a
//! [`ResponseEnvelope`], then hands the finished context to the audit
//! publisher and the metrics recorder.
//!
//! # Metrics Emitted
//!
//! - `hermes_requests_total{route, status}`
//! - `hermes_request_duration_seconds{route}`

use hermes_core::{RequestContext, ResponseEnvelope};
use hermes_telemetry::metrics::record_request;
use http::StatusCode;

use crate::types::{Response, ResponseExt};

/// Route label used in metrics for unrouted requests.
pub const UNROUTED_LABEL: &str = "unrouted";

/// Builds the final envelope for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    /// Creates a formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the envelope without side effects.
    ///
    /// `processed_in_ms` is ignored for unrouted requests.
    #[must_use]
    pub fn envelope(&self, ctx: &RequestContext, processed_in_ms: u64) -> ResponseEnvelope {
        if !ctx.is_valid_route() {
            return ResponseEnvelope::route_not_found();
        }

        let status = ctx.status_code();
        let mut envelope = match ctx.error() {
            Some(record) => ResponseEnvelope::failure(
                record.status_code,
                ctx.trace_id(),
                record.body.clone(),
                processed_in_ms,
            ),
            None => ResponseEnvelope::success(
                status,
                ctx.result().filter(|v| !v.is_null()).cloned(),
                processed_in_ms,
            ),
        };

        if envelope.status.code >= 400 && envelope.status.trace_id.is_none() {
            envelope.status.trace_id = Some(ctx.trace_id().to_string());
        }
        envelope
    }

    /// Finishes the request and returns the HTTP response.
    ///
    /// For routed requests this records the processing time, publishes the
    /// final audit record without waiting, emits metrics and logs the
    /// outcome. Unrouted requests get the fixed 404 envelope and nothing
    /// else.
    pub fn send(&self, ctx: &mut RequestContext) -> Response {
        if !ctx.is_valid_route() {
            tracing::debug!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %format!("{}{}", ctx.mount_path(), ctx.path()),
                "no route matched"
            );
            record_request(UNROUTED_LABEL, StatusCode::NOT_FOUND.as_u16(), ctx.elapsed());
            let envelope = ResponseEnvelope::route_not_found();
            return Response::json(envelope.status_code(), &envelope);
        }

        let processed_in_ms = ctx.finish();
        let envelope = self.envelope(ctx, processed_in_ms);
        let status = envelope.status_code();

        if ctx.error().is_some() {
            ctx.log_to_diagnostics();
        }
        ctx.publish_audit(None, None);

        let route = ctx.route_key();
        record_request(&route, status.as_u16(), ctx.elapsed());

        tracing::info!(
            request_id = %ctx.request_id(),
            trace_id = %ctx.trace_id(),
            route = %route,
            status = status.as_u16(),
            identity = %ctx.identity().log_id(),
            duration_ms = processed_in_ms,
            "request completed"
        );

        Response::json(status, &envelope)
    }
}
