//! Bearer routes with the production JWT identity provider.

use std::sync::Arc;

use bytes::Bytes;
use hermes::config::HermesConfig;
use hermes::core::{BoxFuture, GatewayResult, MemoryPublisher, TokenCipher};
use hermes::server::Dispatch;
use hermes::{Gateway, Services, UpstreamProxy, UpstreamRequest};
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

const JWT_SECRET: &str = "jwt-test-secret";
const ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";

#[derive(Debug)]
struct Echo;

impl UpstreamProxy for Echo {
    fn call(&self, request: UpstreamRequest) -> BoxFuture<'_, GatewayResult<Value>> {
        Box::pin(async move { Ok(json!({ "path": request.path })) })
    }
}

fn config() -> HermesConfig {
    let mut config = HermesConfig::default();
    config.auth.jwt_secret = Some(JWT_SECRET.to_string());
    config.auth.jwt_issuer = Some("https://id.example.com".to_string());
    config.crypto.encryption_key = Some(ENCRYPTION_KEY.to_string());
    config.routes.system = false;
    config
}

fn gateway() -> Gateway {
    let config = config();
    let mut services = Services::from_config(&config, Arc::new(MemoryPublisher::new())).unwrap();
    services.upstream = Arc::new(Echo);
    Gateway::new(&config, services).unwrap()
}

fn jwt(secret: &str, issuer: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let claims = json!({ "sub": "merchant-7", "iss": issuer, "exp": exp });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn list_phone_numbers(gateway: &Gateway, bearer: &str) -> (StatusCode, Value) {
    let token = TokenCipher::new(ENCRYPTION_KEY.as_bytes())
        .unwrap()
        .encrypt("EAAG-provider-token")
        .unwrap();
    let query = serde_urlencoded::to_string([("wabaId", "1029384756"), ("token", token.as_str())]).unwrap();
    let (parts, ()) = http::Request::builder()
        .method(Method::GET)
        .uri(format!("/phoneNumbers/list?{query}"))
        .header("authorization", format!("Bearer {bearer}"))
        .body(())
        .unwrap()
        .into_parts();

    let response = gateway.dispatch(parts, Ok(Bytes::new()), None).await;
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_valid_jwt_reaches_provider() {
    let gateway = gateway();
    let (status, body) =
        list_phone_numbers(&gateway, &jwt(JWT_SECRET, "https://id.example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"path": "/1029384756/phone_numbers"}));
}

#[tokio::test]
async fn test_jwt_with_wrong_secret_or_issuer() {
    let gateway = gateway();

    let (status, body) =
        list_phone_numbers(&gateway, &jwt("another-secret", "https://id.example.com")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"]["message"].is_string());
    assert!(body.get("data").is_none());

    let (status, _) = list_phone_numbers(&gateway, &jwt(JWT_SECRET, "https://other.example.com")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_jwt() {
    let gateway = gateway();
    let (status, body) = list_phone_numbers(&gateway, "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"]["message"], "UNAUTHORIZED");
}
