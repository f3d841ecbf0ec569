//! Authentication stage.

use std::sync::Arc;

use hermes_core::{BoxFuture, RequestContext};

use crate::auth::AuthStrategy;
use crate::middleware::{Middleware, Next, Outcome};
use crate::types::Request;

/// Runs the route's [`AuthStrategy`] and attaches the identity.
///
/// On failure the chain stops with the strategy's 401 error.
#[derive(Clone)]
pub struct AuthStage {
    strategy: Arc<dyn AuthStrategy>,
}

impl AuthStage {
    /// Creates a stage using the given strategy.
    pub fn new(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }
}

impl std::fmt::Debug for AuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStage")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl Middleware for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            match self.strategy.verify(&request).await {
                Ok(identity) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        strategy = self.strategy.name(),
                        identity = %identity.log_id(),
                        "caller authenticated"
                    );
                    ctx.set_identity(identity);
                    next.run(ctx, request).await
                }
                Err(error) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        strategy = self.strategy.name(),
                        error = %error,
                        "authentication failed"
                    );
                    Err(error)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticKeyStrategy;
    use bytes::Bytes;
    use hermes_core::{CallerIdentity, ErrorKind, FnHandler};
    use http_body_util::Full;
    use serde_json::json;

    fn handler(ctx: &mut RequestContext) -> BoxFuture<'_, Outcome> {
        Box::pin(async move { Ok(json!({ "identity": ctx.identity().log_id() })) })
    }

    fn request(key: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/system/info");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Full::new(Bytes::new())).unwrap()
    }

    #[tokio::test]
    async fn test_attaches_identity_and_continues() {
        let stage = AuthStage::new(Arc::new(StaticKeyStrategy::new("s3cret")));
        let handler = FnHandler::new(handler);
        let mut ctx = RequestContext::mock();

        let outcome = stage
            .process(&mut ctx, request(Some("s3cret")), Next::handler(&handler))
            .await;

        assert_eq!(outcome.unwrap(), json!({ "identity": "apikey:x-api-key" }));
        assert_eq!(ctx.identity(), &CallerIdentity::api_key("x-api-key"));
    }

    #[tokio::test]
    async fn test_failure_stops_chain() {
        let stage = AuthStage::new(Arc::new(StaticKeyStrategy::new("s3cret")));
        let handler = FnHandler::new(handler);
        let mut ctx = RequestContext::mock();

        let err = stage
            .process(&mut ctx, request(None), Next::handler(&handler))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(
            err.body(),
            json!({ "message": "x-api-key required to access this route" })
        );
        assert_eq!(ctx.identity(), &CallerIdentity::Anonymous);
    }
}
