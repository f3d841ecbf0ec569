//! Pre-handler pipeline stages.
//!
//! Stages run in a fixed order, each at most once per request:
//!
//! 1. [`auth`] - Verify the caller and attach the identity
//! 2. [`validation`] - Validate the payload against the route's schema
//!
//! The handler runs after both; the response formatter runs last.

pub mod auth;
pub mod validation;

pub use auth::AuthStage;
pub use validation::{ValidationDispatcher, ValidationStage};
