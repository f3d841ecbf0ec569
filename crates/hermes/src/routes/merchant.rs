//! Merchant onboarding.
//!
//! `POST /merchant/signUp` exchanges the token a merchant obtained through
//! embedded signup for their WhatsApp Business Account id. The provider's
//! `debug_token` answer is recorded as a `debugTokenCall` audit checkpoint
//! before the id is extracted.

use std::sync::Arc;

use hermes_core::{BoxFuture, GatewayError, GatewayResult, Handler, RequestContext};
use hermes_middleware::Pipeline;
use http::Method;
use serde_json::{json, Value};

use super::{field, payload, Route, RouteTable};
use crate::upstream::{UpstreamProxy, UpstreamRequest};

/// Audit checkpoint label for the `debug_token` answer.
pub const DEBUG_TOKEN_CHECKPOINT: &str = "debugTokenCall";

/// Message returned when the provider answer carries no account id.
pub const WABA_NOT_FOUND_MESSAGE: &str = "Merchant Waba Id not found!! Please retry again.";

const WABA_ID_POINTER: &str = "/data/granular_scopes/0/target_ids/0";

/// Adds the merchant routes to the route table.
pub fn mount(
    table: &mut RouteTable,
    pipeline: &Arc<Pipeline>,
    upstream: &Arc<dyn UpstreamProxy>,
    system_user_token: Option<String>,
) {
    let handler = SignUpHandler::new(Arc::clone(upstream), system_user_token);
    table.add_route(
        Method::POST,
        "/merchant/signUp",
        Route::new(Arc::clone(pipeline), Arc::new(handler)),
    );
}

/// Handles `POST /merchant/signUp`.
pub struct SignUpHandler {
    upstream: Arc<dyn UpstreamProxy>,
    system_user_token: Option<String>,
}

impl SignUpHandler {
    /// Creates the handler. Calls are made with the system-user token.
    pub fn new(upstream: Arc<dyn UpstreamProxy>, system_user_token: Option<String>) -> Self {
        Self {
            upstream,
            system_user_token,
        }
    }
}

impl Handler for SignUpHandler {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>> {
        Box::pin(async move {
            let system_token = self.system_user_token.as_deref().ok_or_else(|| {
                GatewayError::configuration("system user access token is not configured")
            })?;
            let params = payload(ctx)?;
            let input_token = field(&params, "inputToken")?;

            let request = UpstreamRequest::get("/debug_token")
                .query("input_token", input_token)
                .bearer(system_token);
            let debug_token = self.upstream.call(request).await?;
            ctx.publish_audit(Some(DEBUG_TOKEN_CHECKPOINT), Some(debug_token.clone()));

            let Some(waba_id) = waba_id(&debug_token) else {
                tracing::warn!(request_id = %ctx.request_id(), "debug_token answer has no account id");
                return Err(GatewayError::raw(json!({
                    "message": WABA_NOT_FOUND_MESSAGE,
                    "fbResponse": debug_token,
                })));
            };

            tracing::info!(
                request_id = %ctx.request_id(),
                merchant_id = field(&params, "merchantId").unwrap_or_default(),
                waba_id = %waba_id,
                "merchant signed up"
            );
            Ok(json!({ "wabaId": waba_id }))
        })
    }
}

/// First target id of the first granular scope.
fn waba_id(debug_token: &Value) -> Option<String> {
    debug_token
        .pointer(WABA_ID_POINTER)
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hermes_core::MemoryPublisher;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct Canned {
        answer: GatewayResult<Value>,
        seen: Mutex<Vec<UpstreamRequest>>,
    }

    impl UpstreamProxy for Canned {
        fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, GatewayResult<Value>> {
            self.seen.lock().push(request);
            let answer = self.answer.clone();
            Box::pin(async move { answer })
        }
    }

    fn canned(answer: GatewayResult<Value>) -> Arc<Canned> {
        Arc::new(Canned {
            answer,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn context(publisher: Arc<MemoryPublisher>) -> RequestContext {
        let (parts, ()) = http::Request::builder()
            .method(Method::POST)
            .uri("/merchant/signUp")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let body = Bytes::from_static(br#"{"inputToken":"EAAI-merchant","merchantId":"m-1"}"#);
        RequestContext::from_parts(&parts, &body, None, BTreeMap::new())
            .with_audit_publisher(publisher)
    }

    #[test]
    fn test_waba_id_extraction() {
        let answer = json!({"data": {"granular_scopes": [{"scope": "whatsapp_business_management", "target_ids": ["1029384756"]}]}});
        assert_eq!(waba_id(&answer).as_deref(), Some("1029384756"));
        assert_eq!(waba_id(&json!({"data": {"granular_scopes": []}})), None);
        assert_eq!(waba_id(&json!({})), None);
    }

    #[tokio::test]
    async fn test_sign_up_returns_waba_id_and_checkpoints() {
        let answer = json!({"data": {"granular_scopes": [{"target_ids": ["1029384756"]}]}});
        let upstream = canned(Ok(answer.clone()));
        let handler = SignUpHandler::new(upstream.clone(), Some("system-token".to_string()));
        let publisher = Arc::new(MemoryPublisher::new());
        let mut ctx = context(publisher.clone());

        let value = handler.call(&mut ctx).await.unwrap();
        assert_eq!(value, json!({"wabaId": "1029384756"}));

        let seen = upstream.seen.lock();
        assert_eq!(seen[0].path, "/debug_token");
        assert_eq!(seen[0].access_token, "system-token");
        assert_eq!(
            seen[0].query,
            vec![("input_token".to_string(), "EAAI-merchant".to_string())]
        );

        let records = publisher.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_name.as_deref(), Some(DEBUG_TOKEN_CHECKPOINT));
        assert_eq!(records[0].sequence_number, 1);
        assert_eq!(ctx.operation_log().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_up_without_waba_id() {
        let answer = json!({"data": {"is_valid": false}});
        let handler = SignUpHandler::new(canned(Ok(answer.clone())), Some("system-token".to_string()));
        let mut ctx = context(Arc::new(MemoryPublisher::new()));

        let err = handler.call(&mut ctx).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.body(),
            json!({"message": WABA_NOT_FOUND_MESSAGE, "fbResponse": answer})
        );
    }

    #[tokio::test]
    async fn test_sign_up_without_system_token() {
        let handler = SignUpHandler::new(canned(Ok(Value::Null)), None);
        let mut ctx = context(Arc::new(MemoryPublisher::new()));
        let err = handler.call(&mut ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration { .. }));
    }
}
