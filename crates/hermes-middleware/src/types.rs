//! Common types used throughout the pipeline.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::Full;
use serde::Serialize;

/// The HTTP request type used in the pipeline.
///
/// The body has already been collected; stages read headers from it and
/// handlers read the parsed payload from the context.
pub type Request = http::Request<Full<Bytes>>;

/// The HTTP response type produced by the gateway.
pub type Response = http::Response<Full<Bytes>>;

/// Extension trait for building responses without a fallible builder.
pub trait ResponseExt {
    /// Creates a JSON response from any serializable value.
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response;

    /// Creates a plain-text response.
    fn text(status: StatusCode, body: impl Into<String>) -> Response;

    /// Creates a response with an empty body.
    fn empty(status: StatusCode) -> Response;
}

impl ResponseExt for Response {
    fn json<T: Serialize>(status: StatusCode, body: &T) -> Response {
        let bytes = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
        with_content_type(status, Bytes::from(bytes), "application/json")
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Response {
        with_content_type(status, Bytes::from(body.into()), "text/plain; charset=utf-8")
    }

    fn empty(status: StatusCode) -> Response {
        let mut response = http::Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    }
}

fn with_content_type(status: StatusCode, body: Bytes, content_type: &'static str) -> Response {
    let mut response = http::Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
