//! Core middleware trait and chain types.
//!
//! A [`Middleware`] stage receives the mutable [`RequestContext`], the
//! request and a [`Next`] continuation. It either short-circuits with an
//! error or calls `next.run()` exactly once. The chain ends at the route's
//! [`Handler`].
//!
//! Stages produce an [`Outcome`], not a response: turning the outcome into
//! an envelope is the job of the response formatter, which runs once after
//! the whole chain has finished.
//!
//! # Example
//!
//! ```
//! use hermes_core::{BoxFuture, RequestContext};
//! use hermes_middleware::{Middleware, Next, Outcome, Request};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut RequestContext,
//!         request: Request,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Outcome> {
//!         Box::pin(async move {
//!             let outcome = next.run(ctx, request).await;
//!             tracing::debug!(elapsed = ?ctx.elapsed(), "stage chain finished");
//!             outcome
//!         })
//!     }
//! }
//! ```

use hermes_core::{BoxFuture, GatewayResult, Handler, RequestContext};
use serde_json::Value;

use crate::types::Request;

/// What a stage chain produces: the handler's payload or the first error.
pub type Outcome = GatewayResult<Value>;

/// A pipeline stage.
///
/// # Invariants
///
/// - A stage calls `next.run()` at most once
/// - A stage that returns an error without calling `next` stops the chain
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this stage, used in logs.
    fn name(&self) -> &'static str;

    /// Processes the request through this stage.
    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome>;
}

/// Continuation to the rest of the chain.
///
/// Consumed by [`Next::run`], so it can only be invoked once.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn Middleware,
        next: Box<Next<'a>>,
    },
    Handler(&'a dyn Handler),
}

impl<'a> Next<'a> {
    /// Creates a `Next` that will invoke the given stage.
    pub(crate) fn new(middleware: &'a dyn Middleware, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the handler.
    pub fn handler(handler: &'a dyn Handler) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Invokes the next stage or the handler.
    pub async fn run(self, ctx: &mut RequestContext, request: Request) -> Outcome {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                middleware.process(ctx, request, *next).await
            }
            NextInner::Handler(handler) => handler.call(ctx).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Chain { middleware, .. } => f
                .debug_struct("Next")
                .field("stage", &middleware.name())
                .finish(),
            NextInner::Handler(_) => f.debug_struct("Next").field("stage", &"handler").finish(),
        }
    }
}
