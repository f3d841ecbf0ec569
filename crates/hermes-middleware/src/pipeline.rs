//! Fixed-order request pipeline.
//!
//! Every routed request flows through the same stages in the same order:
//!
//! 1. **Auth** - optional, one strategy per route
//! 2. **Validation** - optional, keyed by route
//! 3. Route-specific extra stages, in registration order
//! 4. **Handler**
//! 5. **Format** - run by the caller through the response formatter
//!
//! The pipeline never produces a response itself. It records exactly one
//! outcome on the context: the handler's payload, or the first error
//! normalized into an [`ErrorRecord`](hermes_core::ErrorRecord).

use std::sync::Arc;

use hermes_core::{normalize, Handler, RequestContext};

use crate::middleware::{Middleware, Next};
use crate::stages::{AuthStage, ValidationStage};
use crate::types::Request;

/// A type-erased stage that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An immutable, per-route stage chain.
///
/// # Example
///
/// ```
/// use hermes_core::{BoxFuture, FnHandler, GatewayResult, RequestContext};
/// use hermes_middleware::{Pipeline, Request};
/// use serde_json::{json, Value};
///
/// fn ok(_ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
///     Box::pin(async { Ok(json!({"ok": true})) })
/// }
///
/// # tokio_test::block_on(async {
/// let pipeline = Pipeline::builder().build();
/// let handler = FnHandler::new(ok);
///
/// let mut ctx = RequestContext::mock();
/// let request = Request::new(Default::default());
/// pipeline.execute(&mut ctx, request, &handler).await;
/// assert_eq!(ctx.result(), Some(&json!({"ok": true})));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    auth: Option<Arc<AuthStage>>,
    validation: Option<Arc<ValidationStage>>,
    extra: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs the stages and the handler, recording the outcome on `ctx`.
    ///
    /// Errors from any stage are normalized here; nothing propagates to the
    /// caller.
    pub async fn execute(&self, ctx: &mut RequestContext, request: Request, handler: &dyn Handler) {
        let next = self.build_chain(handler);
        match next.run(ctx, request).await {
            Ok(value) => {
                ctx.set_result(value);
            }
            Err(error) => {
                let record = normalize(&error, None);
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    kind = ?record.kind,
                    status = record.status_code.as_u16(),
                    "pipeline stopped with error"
                );
                ctx.fail(record);
            }
        }
    }

    fn build_chain<'a>(&'a self, handler: &'a dyn Handler) -> Next<'a> {
        let mut next = Next::handler(handler);

        for middleware in self.extra.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        if let Some(validation) = &self.validation {
            next = Next::new(validation.as_ref(), next);
        }
        if let Some(auth) = &self.auth {
            next = Next::new(auth.as_ref(), next);
        }

        next
    }

    /// Returns the names of all stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(self.stage_count());
        if let Some(auth) = &self.auth {
            names.push(auth.name());
        }
        if let Some(validation) = &self.validation {
            names.push(validation.name());
        }
        names.extend(self.extra.iter().map(|mw| mw.name()));
        names
    }

    /// Returns the number of stages before the handler.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        usize::from(self.auth.is_some()) + usize::from(self.validation.is_some()) + self.extra.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
///
/// Auth and validation occupy fixed slots; calling [`auth`](Self::auth)
/// twice replaces the strategy rather than adding a second stage.
#[derive(Default)]
pub struct PipelineBuilder {
    auth: Option<Arc<AuthStage>>,
    validation: Option<Arc<ValidationStage>>,
    extra: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the auth stage.
    #[must_use]
    pub fn auth(mut self, stage: AuthStage) -> Self {
        self.auth = Some(Arc::new(stage));
        self
    }

    /// Sets the validation stage.
    #[must_use]
    pub fn validation(mut self, stage: ValidationStage) -> Self {
        self.validation = Some(Arc::new(stage));
        self
    }

    /// Appends a stage that runs after validation and before the handler.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.extra.push(Arc::new(middleware));
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            auth: self.auth,
            validation: self.validation,
            extra: self.extra,
        }
    }
}

/// Lifecycle stage marker, used in logs and for ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Caller verification
    Auth = 1,
    /// Payload validation
    Validation = 2,
    /// Route handler
    Handler = 3,
    /// Envelope, audit and metrics
    Format = 4,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Validation => "validation",
            Self::Handler => "handler",
            Self::Format => "format",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 4] {
        [Self::Auth, Self::Validation, Self::Handler, Self::Format]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticKeyStrategy;
    use crate::middleware::Outcome;
    use crate::schema::SchemaRegistry;
    use crate::stages::ValidationDispatcher;
    use bytes::Bytes;
    use hermes_core::{BoxFuture, ErrorKind, FnHandler, GatewayError};
    use http::{Method, StatusCode};
    use http_body_util::Full;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Checkpoint(&'static str);

    impl Middleware for Checkpoint {
        fn name(&self) -> &'static str {
            self.0
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut RequestContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, Outcome> {
            Box::pin(async move {
                ctx.publish_audit(Some(self.0), None);
                next.run(ctx, request).await
            })
        }
    }

    fn ok_handler(ctx: &mut RequestContext) -> BoxFuture<'_, Outcome> {
        Box::pin(async move {
            ctx.publish_audit(Some("handler"), None);
            Ok(json!({"sent": true}))
        })
    }

    fn failing_handler(_ctx: &mut RequestContext) -> BoxFuture<'_, Outcome> {
        Box::pin(async { Err(GatewayError::upstream(Some(409), json!({"message": "duplicate"}))) })
    }

    fn request(method: Method, key: Option<&str>, body: &'static str) -> (RequestContext, Request) {
        let mut builder = http::Request::builder().method(method).uri("/items/check");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        let request = builder.body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap();
        let (parts, full) = request.into_parts();
        let ctx = RequestContext::from_parts(
            &parts,
            &Bytes::from_static(body.as_bytes()),
            None,
            BTreeMap::new(),
        );
        (ctx, http::Request::from_parts(parts, full))
    }

    fn guarded_pipeline() -> Pipeline {
        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "items/check",
                json!({"type": "object", "required": ["name"]}),
            )
            .unwrap();

        Pipeline::builder()
            .auth(AuthStage::new(Arc::new(StaticKeyStrategy::new("secret"))))
            .validation(ValidationStage::new(ValidationDispatcher::new(Arc::new(registry))))
            .stage(Checkpoint("extra"))
            .build()
    }

    #[tokio::test]
    async fn test_success_records_result() {
        let pipeline = guarded_pipeline();
        let handler = FnHandler::new(ok_handler);
        let (mut ctx, req) = request(Method::POST, Some("secret"), r#"{"name": "a"}"#);

        pipeline.execute(&mut ctx, req, &handler).await;

        assert_eq!(ctx.result(), Some(&json!({"sent": true})));
        assert!(ctx.error().is_none());
        assert_eq!(ctx.status_code(), StatusCode::OK);
        let names: Vec<_> = ctx.operation_log().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["extra", "handler"]);
    }

    #[tokio::test]
    async fn test_auth_runs_before_validation() {
        let pipeline = guarded_pipeline();
        let handler = FnHandler::new(ok_handler);
        let (mut ctx, req) = request(Method::POST, None, "{}");

        pipeline.execute(&mut ctx, req, &handler).await;

        let error = ctx.error().unwrap();
        assert_eq!(error.kind, ErrorKind::Auth);
        assert_eq!(ctx.status_code(), StatusCode::UNAUTHORIZED);
        assert!(ctx.result().is_none());
        assert!(ctx.operation_log().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_skips_handler() {
        let pipeline = guarded_pipeline();
        let handler = FnHandler::new(ok_handler);
        let (mut ctx, req) = request(Method::POST, Some("secret"), "{}");

        pipeline.execute(&mut ctx, req, &handler).await;

        assert_eq!(ctx.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ctx.error().unwrap().kind, ErrorKind::Validation);
        assert!(ctx.operation_log().is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_is_normalized() {
        let pipeline = Pipeline::builder().build();
        let handler = FnHandler::new(failing_handler);
        let (mut ctx, req) = request(Method::GET, None, "");

        pipeline.execute(&mut ctx, req, &handler).await;

        let error = ctx.error().unwrap();
        assert_eq!(error.status_code, StatusCode::CONFLICT);
        assert_eq!(error.body, json!({"message": "duplicate"}));
        assert_eq!(ctx.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_stage_names_in_order() {
        assert_eq!(guarded_pipeline().stage_names(), ["auth", "validation", "extra"]);
        assert_eq!(guarded_pipeline().stage_count(), 3);
        assert_eq!(Pipeline::builder().build().stage_count(), 0);
    }

    #[test]
    fn test_stage_ordering() {
        let stages = Stage::all();
        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(stages[0].name(), "auth");
        assert_eq!(stages[3].name(), "format");
    }
}
