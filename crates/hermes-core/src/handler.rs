//! Handler trait for route execution.
//!
//! A [`Handler`] is the terminal stage of a route's pipeline. It reads the
//! parsed body, query and path parameters from the [`RequestContext`] and
//! returns the success payload or a [`GatewayError`](crate::GatewayError).
//! Handlers may publish intermediate audit checkpoints through the context.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::error::GatewayResult;
use crate::RequestContext;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A route handler.
///
/// # Example
///
/// ```
/// use hermes_core::{BoxFuture, GatewayResult, Handler, RequestContext};
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>> {
///         Box::pin(async move { Ok(json!({ "path": ctx.path() })) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Executes the route.
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>>;
}

/// A function-based handler wrapper.
///
/// # Example
///
/// ```
/// use hermes_core::{BoxFuture, FnHandler, GatewayResult, RequestContext};
/// use serde_json::{json, Value};
///
/// fn request_id(ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
///     let id = ctx.request_id().to_string();
///     Box::pin(async move { Ok(json!({ "requestId": id })) })
/// }
///
/// let handler = FnHandler::new(request_id);
/// # let _ = &handler;
/// ```
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new function-based handler.
    #[must_use]
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>> {
        (self.func)(ctx)
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GatewayError;
    use serde_json::json;

    fn route_key(ctx: &mut RequestContext) -> BoxFuture<'_, GatewayResult<Value>> {
        Box::pin(async move { Ok(json!({ "key": ctx.route_key() })) })
    }

    struct Failing;

    impl Handler for Failing {
        fn call<'a>(&'a self, _ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>> {
            Box::pin(async { Err(GatewayError::unknown("boom")) })
        }
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = FnHandler::new(route_key);
        let mut ctx = RequestContext::mock();
        let value = handler.call(&mut ctx).await.unwrap();
        assert_eq!(value, json!({ "key": "/" }));
    }

    #[tokio::test]
    async fn test_handler_error() {
        let mut ctx = RequestContext::mock();
        let err = Failing.call(&mut ctx).await.unwrap_err();
        assert_eq!(err.body(), json!({ "message": "boom" }));
    }

    #[tokio::test]
    async fn test_handler_can_publish_checkpoint() {
        let handler = FnHandler::new(|ctx: &mut RequestContext| {
            Box::pin(async move {
                ctx.publish_audit(Some("step"), Some(json!({ "n": 1 })));
                Ok(Value::Null)
            })
        });
        let mut ctx = RequestContext::mock();
        handler.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.operation_log().len(), 1);
    }
}
