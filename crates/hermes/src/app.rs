//! Gateway assembly and request dispatch.
//!
//! [`Gateway`] owns the route table and implements
//! [`Dispatch`](hermes_server::Dispatch): CORS, `/ping`, route lookup, the
//! per-route pipeline under the request timeout, and the formatter. [`run`]
//! wires it to the audit worker and the HTTP server.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hermes_config::HermesConfig;
use hermes_core::{
    normalize, AuditPublisher, BoxFuture, GatewayError, RequestContext, TokenCipher,
};
use hermes_middleware::{
    AuthStage, BearerIdentityStrategy, CorsPolicy, IdentityProvider, JwtIdentityProvider,
    Pipeline, Response, ResponseExt, ResponseFormatter, StaticKeyStrategy,
    ValidationDispatcher, ValidationStage,
};
use hermes_server::{BodyError, Dispatch, HttpResponse, Server};
use hermes_telemetry::{AuditSink, BatchingPublisher, HttpSink, LogSink};
use http::request::Parts;
use http::{header, Method, StatusCode};
use http_body_util::Full;

use crate::error::{AppError, AppResult};
use crate::routes::{business, merchant, system, RouteTable};
use crate::schemas;
use crate::upstream::{GraphClient, UpstreamProxy};

/// Path of the liveness route.
pub const PING_PATH: &str = "/ping";

const AUDIT_SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// External collaborators of the gateway.
#[derive(Clone)]
pub struct Services {
    /// Verifies bearer tokens.
    pub identity: Arc<dyn IdentityProvider>,
    /// Calls the Graph API.
    pub upstream: Arc<dyn UpstreamProxy>,
    /// Receives audit records.
    pub audit: Arc<dyn AuditPublisher>,
}

impl Services {
    /// Builds the production collaborators from configuration: a JWT
    /// identity provider and a Graph API client.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if no identity key material is configured, the
    /// public key is not valid PEM, or the HTTP client cannot be created.
    pub fn from_config(config: &HermesConfig, audit: Arc<dyn AuditPublisher>) -> AppResult<Self> {
        let identity = identity_provider(config)?;
        let upstream = GraphClient::new(&config.upstream.base_url, config.upstream.timeout())?;
        Ok(Self {
            identity,
            upstream: Arc::new(upstream),
            audit,
        })
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

fn identity_provider(config: &HermesConfig) -> AppResult<Arc<dyn IdentityProvider>> {
    let auth = &config.auth;
    let mut provider = if let Some(pem) = auth.jwt_public_key_pem.as_deref().filter(|p| !p.is_empty()) {
        JwtIdentityProvider::rs256_pem(pem.as_bytes())
            .map_err(|e| AppError::identity(format!("invalid RS256 public key: {e}")))?
    } else if let Some(secret) = auth.jwt_secret.as_deref().filter(|s| !s.is_empty()) {
        JwtIdentityProvider::hs256(secret.as_bytes())
    } else {
        return Err(AppError::identity(
            "auth.jwt_secret or auth.jwt_public_key_pem is required",
        ));
    };

    if let Some(issuer) = &auth.jwt_issuer {
        provider = provider.with_issuer(issuer);
    }
    if let Some(audience) = &auth.jwt_audience {
        provider = provider.with_audience(audience);
    }
    Ok(Arc::new(provider))
}

/// The request dispatcher.
pub struct Gateway {
    routes: RouteTable,
    cors: CorsPolicy,
    formatter: ResponseFormatter,
    service_name: String,
    audit: Arc<dyn AuditPublisher>,
    api_key_header: String,
    request_timeout: Duration,
}

impl Gateway {
    /// Builds the route table for the enabled route groups.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if a schema fails to compile or business routes
    /// are enabled without an encryption key.
    pub fn new(config: &HermesConfig, services: Services) -> AppResult<Self> {
        let mut routes = RouteTable::new();

        if config.routes.system {
            match config.auth.api_key.as_deref().filter(|k| !k.is_empty()) {
                Some(key) => {
                    let strategy = StaticKeyStrategy::new(key).with_header(&config.auth.api_key_header);
                    let pipeline = Arc::new(
                        Pipeline::builder()
                            .auth(AuthStage::new(Arc::new(strategy)))
                            .build(),
                    );
                    system::mount(&mut routes, &pipeline);
                }
                None => tracing::warn!("auth.api_key is not set, system routes are disabled"),
            }
        }

        if config.routes.business {
            let key = config
                .crypto
                .encryption_key
                .as_deref()
                .ok_or_else(|| AppError::setup("crypto.encryption_key is required for business routes"))?;
            let cipher = Arc::new(TokenCipher::new(key.as_bytes())?);
            let registry = Arc::new(schemas::registry()?);
            let strategy = BearerIdentityStrategy::new(Arc::clone(&services.identity));
            let pipeline = Arc::new(
                Pipeline::builder()
                    .auth(AuthStage::new(Arc::new(strategy)))
                    .validation(ValidationStage::new(ValidationDispatcher::new(registry)))
                    .build(),
            );

            business::mount(&mut routes, &pipeline, &cipher, &services.upstream);
            merchant::mount(
                &mut routes,
                &pipeline,
                &services.upstream,
                config.upstream.system_user_token.clone(),
            );
        }

        Ok(Self {
            routes,
            cors: CorsPolicy::new(config.cors.allowed_origins.iter()),
            formatter: ResponseFormatter::new(),
            service_name: config.telemetry.service_name.clone(),
            audit: services.audit,
            api_key_header: config.auth.api_key_header.clone(),
            request_timeout: Duration::from_millis(config.server.request_timeout_ms),
        })
    }

    /// Returns the route table.
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Logs every mounted route at debug level.
    pub fn log_routes(&self) {
        tracing::info!(count = self.routes.route_count(), "routes mounted");
        for (method, path) in self.routes.routes() {
            tracing::debug!(%method, path, "route");
        }
    }

    fn ping(&self) -> Response {
        Response::text(
            StatusCode::OK,
            format!("PONG : {} service is awake...", self.service_name),
        )
    }

    async fn handle(
        &self,
        parts: Parts,
        body: Result<Bytes, BodyError>,
        remote_addr: Option<SocketAddr>,
    ) -> Response {
        if parts.method == Method::GET && parts.uri.path() == PING_PATH {
            return self.ping();
        }

        let matched = self.routes.match_route(&parts.method, parts.uri.path());
        let (route, params) = match matched {
            Some(matched) => (Some(matched.value()), matched.into_params()),
            None => (None, BTreeMap::new()),
        };

        let bytes = body.as_ref().map_or_else(|_| Bytes::new(), Bytes::clone);
        let mut ctx = RequestContext::from_parts(&parts, &bytes, remote_addr, params)
            .with_service_name(&self.service_name)
            .with_audit_publisher(Arc::clone(&self.audit))
            .with_redacted_header(&self.api_key_header);

        let Some(route) = route else {
            ctx.mark_route_not_found();
            return self.formatter.send(&mut ctx);
        };

        if let Err(error) = body {
            let status = match error {
                BodyError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                BodyError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                BodyError::Read(_) => StatusCode::BAD_REQUEST,
            };
            tracing::debug!(request_id = %ctx.request_id(), %error, "request body rejected");
            ctx.fail(normalize(&GatewayError::unknown(error.to_string()), Some(status)));
            return self.formatter.send(&mut ctx);
        }

        let request = http::Request::from_parts(parts, Full::new(bytes));
        let execution = route.pipeline().execute(&mut ctx, request, route.handler());
        if tokio::time::timeout(self.request_timeout, execution).await.is_err() {
            tracing::warn!(
                request_id = %ctx.request_id(),
                route = %ctx.route_key(),
                timeout_ms = u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                "request timed out"
            );
            ctx.fail(normalize(
                &GatewayError::unknown("request timed out"),
                Some(StatusCode::GATEWAY_TIMEOUT),
            ));
        }

        self.formatter.send(&mut ctx)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("routes", &self.routes.route_count())
            .field("cors", &self.cors)
            .field("service_name", &self.service_name)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatch for Gateway {
    fn dispatch(
        &self,
        parts: Parts,
        body: Result<Bytes, BodyError>,
        remote_addr: Option<SocketAddr>,
    ) -> BoxFuture<'_, HttpResponse> {
        Box::pin(async move {
            let origin = parts
                .headers
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            if let Some(response) = self.cors.preflight(origin.as_deref(), &parts.method) {
                return response;
            }

            let mut response = self.handle(parts, body, remote_addr).await;
            self.cors.apply(origin.as_deref(), &mut response);
            response
        })
    }
}

/// Runs the gateway until SIGTERM or SIGINT, then flushes the audit queue.
///
/// # Errors
///
/// Returns `AppError` if the gateway cannot be assembled or the server
/// fails to bind.
pub async fn run(config: HermesConfig) -> AppResult<()> {
    let sink: Arc<dyn AuditSink> = match config.audit.endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!(endpoint, "shipping audit records to collector");
            Arc::new(HttpSink::new(endpoint, AUDIT_SINK_TIMEOUT)?)
        }
        None => Arc::new(LogSink),
    };
    let (publisher, worker) = BatchingPublisher::spawn(sink, config.to_batch_config());

    let served = serve(&config, Arc::new(publisher)).await;
    worker.shutdown().await;
    served
}

async fn serve(config: &HermesConfig, audit: Arc<dyn AuditPublisher>) -> AppResult<()> {
    let services = Services::from_config(config, audit)?;
    let gateway = Gateway::new(config, services)?;
    gateway.log_routes();

    let server_config = hermes_server::ServerConfig::builder()
        .http_addr(&config.server.http_addr)
        .shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs))
        .request_timeout(Duration::from_millis(config.server.request_timeout_ms))
        .body_limit(config.server.body_limit_bytes)
        .keep_alive(config.server.keep_alive)
        .build();

    tracing::info!(
        version = crate::VERSION,
        addr = %config.server.http_addr,
        service = %config.telemetry.service_name,
        "starting gateway"
    );
    Server::new(server_config, Arc::new(gateway)).run().await?;
    Ok(())
}
