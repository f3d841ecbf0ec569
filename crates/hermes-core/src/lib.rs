//! # Hermes Core
//!
//! Core types shared by every stage of the Hermes gateway pipeline.
//!
//! - [`RequestContext`] - Per-request state created once and threaded through the pipeline
//! - [`RequestId`] - UUID v7 request identifier
//! - [`CallerIdentity`] - Identity attached by an auth strategy
//! - [`GatewayError`] - Error taxonomy and normalization into an [`ErrorRecord`]
//! - [`ResponseEnvelope`] - The uniform JSON wrapper returned for every request
//! - [`AuditPublisher`] - Fire-and-forget sink for serialized contexts
//! - [`TokenCipher`] - Symmetric cipher for caller-supplied upstream tokens
//! - [`Handler`] - Route handler trait

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
mod context;
pub mod crypto;
mod envelope;
mod error;
mod handler;
mod identity;
pub mod status;

pub use audit::{AuditPublisher, AuditRecord, MemoryPublisher, NoopPublisher, PublishError};
pub use context::{
    OperationSnapshot, RequestContext, RequestId, FORWARDED_FOR_HEADER, TRACE_ID_HEADER,
};
pub use crypto::{CipherError, TokenCipher};
pub use envelope::{ResponseEnvelope, StatusBlock};
pub use error::{
    normalize, ErrorKind, ErrorRecord, GatewayError, GatewayResult, Violation,
    ROUTE_NOT_FOUND_MESSAGE,
};
pub use handler::{BoxFuture, FnHandler, Handler};
pub use identity::CallerIdentity;
