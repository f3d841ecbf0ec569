//! # Hermes Server
//!
//! HTTP server infrastructure for the Hermes gateway:
//!
//! - HTTP/1.1 via Hyper, one Tokio task per connection
//! - Request body limit and collection timeout
//! - A route registry built once at startup
//! - Graceful shutdown on SIGTERM/SIGINT with connection draining
//!
//! The gateway plugs in through the [`Dispatch`] trait.

#![doc(html_root_url = "https://docs.rs/hermes-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{BodyError, ServerError};
pub use router::{RouteMatch, Router};
pub use server::{collect_body, Dispatch, HttpResponse, Server};
pub use shutdown::{ConnectionGuard, ConnectionTracker, ShutdownSignal};
