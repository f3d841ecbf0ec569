//! Schema validation stage.
//!
//! The schema is picked by route key (`messages/text`); the payload is
//! picked by method:
//!
//! | Method               | Payload |
//! |----------------------|---------|
//! | `POST`, `PUT`, `PATCH` | body  |
//! | anything else        | query   |
//!
//! A route without a registered schema is an operator error and fails with
//! a 500 configuration error. Invalid payloads fail with 400 and the full
//! list of violations.

use std::borrow::Cow;
use std::sync::Arc;

use hermes_core::{BoxFuture, GatewayError, GatewayResult, RequestContext};
use http::Method;
use serde_json::Value;

use crate::middleware::{Middleware, Next, Outcome};
use crate::schema::SchemaRegistry;
use crate::types::Request;

/// Which part of the request is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    /// The parsed request body.
    Body,
    /// The parsed query string.
    Query,
}

impl PayloadSource {
    /// Picks the payload for a method.
    #[must_use]
    pub fn for_method(method: &Method) -> Self {
        if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
            Self::Body
        } else {
            Self::Query
        }
    }
}

/// Validates request payloads against the schema registry.
#[derive(Debug, Clone)]
pub struct ValidationDispatcher {
    registry: Arc<SchemaRegistry>,
}

impl ValidationDispatcher {
    /// Creates a dispatcher over a shared registry.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// Validates the context's payload.
    ///
    /// Synchronous; never modifies the payload.
    pub fn validate(&self, ctx: &RequestContext) -> GatewayResult<()> {
        let key = ctx.route_key();
        let entry = self.registry.get(&key).ok_or_else(|| {
            tracing::error!(route = %key, "no schema registered for route");
            GatewayError::configuration(format!("no schema registered for {key}"))
        })?;

        let payload: Cow<'_, Value> = match PayloadSource::for_method(ctx.method()) {
            PayloadSource::Body => Cow::Borrowed(ctx.body()),
            PayloadSource::Query => Cow::Owned(Value::Object(ctx.query().clone())),
        };

        let violations = entry.violations(&payload);
        if violations.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                request_id = %ctx.request_id(),
                route = %key,
                violations = violations.len(),
                "payload failed validation"
            );
            Err(GatewayError::validation(violations))
        }
    }
}

/// Pipeline stage wrapping a [`ValidationDispatcher`].
#[derive(Debug, Clone)]
pub struct ValidationStage {
    dispatcher: ValidationDispatcher,
}

impl ValidationStage {
    /// Creates the stage.
    pub fn new(dispatcher: ValidationDispatcher) -> Self {
        Self { dispatcher }
    }
}

impl Middleware for ValidationStage {
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            self.dispatcher.validate(ctx)?;
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hermes_core::{normalize, ErrorKind};
    use http::StatusCode;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn registry() -> Arc<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "items/check",
                json!({
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string", "maxLength": 5 } }
                }),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn context(method: Method, uri: &str, body: &'static str) -> RequestContext {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        RequestContext::from_parts(&parts, &Bytes::from_static(body.as_bytes()), None, BTreeMap::new())
    }

    #[test]
    fn test_payload_source_by_method() {
        assert_eq!(PayloadSource::for_method(&Method::GET), PayloadSource::Query);
        assert_eq!(PayloadSource::for_method(&Method::DELETE), PayloadSource::Query);
        assert_eq!(PayloadSource::for_method(&Method::HEAD), PayloadSource::Query);
        assert_eq!(PayloadSource::for_method(&Method::OPTIONS), PayloadSource::Query);
        assert_eq!(PayloadSource::for_method(&Method::POST), PayloadSource::Body);
        assert_eq!(PayloadSource::for_method(&Method::PUT), PayloadSource::Body);
        assert_eq!(PayloadSource::for_method(&Method::PATCH), PayloadSource::Body);
    }

    #[test]
    fn test_get_validates_query_not_body() {
        let dispatcher = ValidationDispatcher::new(registry());

        let ctx = context(Method::GET, "/items/check?name=abc", r#"{"bogus": 1}"#);
        assert!(dispatcher.validate(&ctx).is_ok());

        let ctx = context(Method::DELETE, "/items/check", r#"{"name": "abc"}"#);
        assert!(dispatcher.validate(&ctx).is_err());
    }

    #[test]
    fn test_post_validates_body_not_query() {
        let dispatcher = ValidationDispatcher::new(registry());

        let ctx = context(Method::POST, "/items/check", r#"{"name": "abc"}"#);
        assert!(dispatcher.validate(&ctx).is_ok());

        let ctx = context(Method::PATCH, "/items/check?name=abc", "{}");
        assert!(dispatcher.validate(&ctx).is_err());
    }

    #[test]
    fn test_violation_is_400_with_list() {
        let dispatcher = ValidationDispatcher::new(registry());
        let ctx = context(Method::PUT, "/items/check", r#"{"name": "far too long"}"#);

        let record = normalize(&dispatcher.validate(&ctx).unwrap_err(), None);
        assert_eq!(record.status_code, StatusCode::BAD_REQUEST);
        let violations = record.body.as_array().unwrap();
        assert!(!violations.is_empty());
        assert_eq!(violations[0]["path"], "/name");
        assert_eq!(violations[0]["constraint"], "maxLength");
    }

    #[test]
    fn test_missing_schema_is_configuration_error() {
        let dispatcher = ValidationDispatcher::new(registry());
        let ctx = context(Method::POST, "/items/unknown", "{}");

        let err = dispatcher.validate(&ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(normalize(&err, None).status_code, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
