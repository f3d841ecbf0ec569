//! # Hermes Middleware
//!
//! Request-lifecycle pipeline for the Hermes gateway.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Request → Auth → Validation → [extra stages] → Handler
//!                                                   ↓
//! Response ← Formatter (envelope, audit, metrics) ←─┘
//! ```
//!
//! | Stage      | Type                   | Failure                      |
//! |------------|------------------------|------------------------------|
//! | Auth       | [`AuthStage`]          | 401 `{message}`              |
//! | Validation | [`ValidationStage`]    | 400 violations / 500 no schema |
//! | Handler    | [`hermes_core::Handler`] | normalized error            |
//! | Format     | [`ResponseFormatter`]  | never fails                  |
//!
//! Auth strategies are trait objects ([`AuthStrategy`]) chosen per route:
//! [`StaticKeyStrategy`] compares a shared secret in constant time and
//! [`BearerIdentityStrategy`] delegates to an [`IdentityProvider`].
//!
//! [`CorsPolicy`] sits outside the pipeline; it answers pre-flight requests
//! before routing and decorates every response.
//!
//! ## Example
//!
//! ```
//! use hermes_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages[0].name(), "auth");
//! assert_eq!(stages[3].name(), "format");
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod cors;
pub mod formatter;
pub mod middleware;
pub mod pipeline;
pub mod schema;
pub mod stages;
pub mod types;

pub use auth::{
    AuthStrategy, BearerIdentityStrategy, IdentityProvider, JwtIdentityProvider,
    StaticIdentityProvider, StaticKeyStrategy,
};
pub use cors::CorsPolicy;
pub use formatter::ResponseFormatter;
pub use middleware::{Middleware, Next, Outcome};
pub use pipeline::{BoxedMiddleware, Pipeline, PipelineBuilder, Stage};
pub use schema::{SchemaEntry, SchemaError, SchemaRegistry};
pub use stages::{AuthStage, ValidationDispatcher, ValidationStage};
pub use types::{Request, Response, ResponseExt};
