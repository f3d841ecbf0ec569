//! # Hermes
//!
//! **API gateway in front of the WhatsApp Graph API.**
//!
//! Every request runs the same lifecycle:
//!
//! ```text
//! Request → CORS → Route lookup → Auth → Validation → Handler
//!                                                        ↓
//! Response ← CORS ← Formatter (envelope, audit, metrics) ┘
//! ```
//!
//! Route groups:
//!
//! - `/system/*` operational data behind a shared secret
//! - `/messages/*`, `/phoneNumbers/*`, `/templates/*` forwarded to the
//!   Graph API with the caller's encrypted access token
//! - `/merchant/signUp` embedded-signup onboarding
//! - `/ping` liveness
//!
//! The gateway is assembled by [`Gateway::new`] from a
//! [`HermesConfig`](hermes_config::HermesConfig) and a set of
//! [`Services`]; [`run`] serves it until a shutdown signal arrives.

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod error;
pub mod routes;
pub mod schemas;
pub mod upstream;

/// Core types: request context, errors, envelope, token cipher.
pub use hermes_core as core;

/// HTTP server loop and routing.
pub use hermes_server as server;

/// Pipeline stages, auth strategies, CORS and formatter.
pub use hermes_middleware as middleware;

/// Logging, metrics and the audit publisher.
pub use hermes_telemetry as telemetry;

/// Configuration loading.
pub use hermes_config as config;

pub use app::{run, Gateway, Services, PING_PATH};
pub use error::{AppError, AppResult};
pub use upstream::{GraphClient, UpstreamProxy, UpstreamRequest};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
