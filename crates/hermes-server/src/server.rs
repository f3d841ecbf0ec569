//! HTTP/1.1 server loop.
//!
//! The server owns the listener and connection lifecycle. It collects each
//! request body (bounded by size and time) and hands the request head and
//! body outcome to a [`Dispatch`] implementation, which always answers.
//!
//! # Example
//!
//! ```rust,ignore
//! use hermes_server::{Server, ServerConfig};
//! use std::sync::Arc;
//!
//! let server = Server::new(ServerConfig::default(), Arc::new(gateway));
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hermes_core::BoxFuture;
use http::header::CONTENT_LENGTH;
use http::request::Parts;
use http::HeaderMap;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::{BodyError, ServerError};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The HTTP response type produced by dispatchers.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Turns a request into a response.
///
/// Implementations never fail: every outcome, including a body that could
/// not be collected, becomes a response.
pub trait Dispatch: Send + Sync + 'static {
    /// Handles one request.
    fn dispatch(
        &self,
        parts: Parts,
        body: Result<Bytes, BodyError>,
        remote_addr: Option<SocketAddr>,
    ) -> BoxFuture<'_, HttpResponse>;
}

/// The gateway HTTP server.
pub struct Server<D> {
    config: ServerConfig,
    dispatch: Arc<D>,
}

impl<D> std::fmt::Debug for Server<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D: Dispatch> Server<D> {
    /// Creates a server.
    pub fn new(config: ServerConfig, dispatch: Arc<D>) -> Self {
        Self { config, dispatch }
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Binds the configured address and runs until `shutdown` triggers.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::bind(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::bind(format!("failed to bind to {addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serves connections from an already bound listener until `shutdown`
    /// triggers, then waits up to the shutdown timeout for open
    /// connections to finish.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let guard = tracker.acquire();
                        let shutdown = shutdown.clone();

                        tokio::spawn(async move {
                            if let Err(error) = server.serve_connection(stream, remote_addr, shutdown).await {
                                tracing::debug!(%remote_addr, %error, "connection closed with error");
                            }
                            drop(guard);
                        });
                    }
                    Err(error) => {
                        tracing::error!(%error, "failed to accept connection");
                    }
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let timeout = server.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining connections"
        );

        if tokio::time::timeout(timeout, tracker.wait_for_drain())
            .await
            .is_err()
        {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            );
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn serve_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |request: http::Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, remote_addr).await) }
        });

        let conn = http1::Builder::new()
            .keep_alive(self.config.keep_alive())
            .serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => return result,
            () = shutdown.recv() => {
                tracing::debug!(%remote_addr, "closing connection for shutdown");
            }
        }

        conn.as_mut().graceful_shutdown();
        conn.await
    }

    async fn handle_request(
        &self,
        request: http::Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let body = collect_body(
            &parts.headers,
            body,
            self.config.body_limit(),
            self.config.request_timeout(),
        )
        .await;
        self.dispatch.dispatch(parts, body, Some(remote_addr)).await
    }
}

/// Collects a body, enforcing the size limit and the collection timeout.
///
/// A declared `Content-Length` above the limit is rejected before reading.
pub async fn collect_body<B>(
    headers: &HeaderMap,
    body: B,
    limit: usize,
    timeout: Duration,
) -> Result<Bytes, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if declared.is_some_and(|len| len > u64::try_from(limit).unwrap_or(u64::MAX)) {
        return Err(BodyError::TooLarge { limit });
    }

    match tokio::time::timeout(timeout, Limited::new(body, limit).collect()).await {
        Err(_) => Err(BodyError::Timeout),
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
        Ok(Err(error)) if error.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyError::TooLarge { limit })
        }
        Ok(Err(error)) => Err(BodyError::Read(error.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, StatusCode};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Answers with the body length, or the body error.
    struct Echo;

    impl Dispatch for Echo {
        fn dispatch(
            &self,
            parts: Parts,
            body: Result<Bytes, BodyError>,
            remote_addr: Option<SocketAddr>,
        ) -> BoxFuture<'_, HttpResponse> {
            Box::pin(async move {
                assert!(remote_addr.is_some());
                let (status, text) = match body {
                    Ok(bytes) => (StatusCode::OK, format!("{} {}", parts.uri.path(), bytes.len())),
                    Err(error) => (StatusCode::PAYLOAD_TOO_LARGE, error.to_string()),
                };
                let mut response = HttpResponse::new(Full::new(Bytes::from(text)));
                *response.status_mut() = status;
                response
            })
        }
    }

    async fn start(
        config: ServerConfig,
    ) -> (
        SocketAddr,
        ShutdownSignal,
        tokio::task::JoinHandle<Result<(), ServerError>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = Server::new(config, Arc::new(Echo));
        let handle = tokio::spawn(server.serve(listener, shutdown.clone()));
        (addr, shutdown, handle)
    }

    async fn roundtrip(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_serves_and_shuts_down() {
        let config = ServerConfig::builder()
            .shutdown_timeout(Duration::from_millis(200))
            .build();
        let (addr, shutdown, handle) = start(config).await;

        let response = roundtrip(
            addr,
            "POST /messages/text HTTP/1.1\r\nHost: localhost\r\nContent-Length: 4\r\nConnection: close\r\n\r\nabcd",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("/messages/text 4"));

        shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server should stop")
            .expect("task should not panic");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_declared_oversized_body_rejected() {
        let config = ServerConfig::builder().body_limit(8).build();
        let (addr, shutdown, _handle) = start(config).await;

        let response = roundtrip(
            addr,
            "POST /messages/text HTTP/1.1\r\nHost: localhost\r\nContent-Length: 9\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 413"));
        assert!(response.contains("exceeds 8 bytes"));
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let config = ServerConfig::builder().http_addr("not-an-address").build();
        let server = Server::new(config, Arc::new(Echo));
        let result = server.run_with_shutdown(ShutdownSignal::new()).await;
        assert!(matches!(result, Err(ServerError::Bind(msg)) if msg.contains("invalid address")));
    }

    #[tokio::test]
    async fn test_collect_body_limits() {
        let headers = HeaderMap::new();
        let ok = collect_body(
            &headers,
            Full::new(Bytes::from_static(b"hello")),
            5,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(ok.unwrap(), Bytes::from_static(b"hello"));

        let too_large = collect_body(
            &headers,
            Full::new(Bytes::from_static(b"hello!")),
            5,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(too_large, Err(BodyError::TooLarge { limit: 5 }));
    }

    #[tokio::test]
    async fn test_collect_body_rejects_declared_length() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("100"));
        let result = collect_body(&headers, Full::new(Bytes::new()), 10, Duration::from_secs(1)).await;
        assert_eq!(result, Err(BodyError::TooLarge { limit: 10 }));
    }
}
