//! Route groups and the route table.
//!
//! Every route is a fixed `(method, path)` pair bound to a pipeline (auth
//! variant plus optional validation) and a handler:
//!
//! | Group          | Auth          | Validation | Module       |
//! |----------------|---------------|------------|--------------|
//! | `/system/*`    | static key    | no         | [`system`]   |
//! | `/messages/*`, `/phoneNumbers/*`, `/templates/*` | bearer | yes | [`business`] |
//! | `/merchant/*`  | bearer        | yes        | [`merchant`] |

pub mod business;
pub mod merchant;
pub mod system;

use std::sync::Arc;

use hermes_core::{GatewayError, GatewayResult, Handler, RequestContext};
use hermes_middleware::Pipeline;
use hermes_server::Router;
use http::Method;
use serde_json::{Map, Value};

/// A routed endpoint.
#[derive(Clone)]
pub struct Route {
    pipeline: Arc<Pipeline>,
    handler: Arc<dyn Handler>,
}

impl Route {
    /// Binds a handler to a pipeline.
    pub fn new(pipeline: Arc<Pipeline>, handler: Arc<dyn Handler>) -> Self {
        Self { pipeline, handler }
    }

    /// Returns the pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the handler.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("stages", &self.pipeline.stage_names())
            .finish_non_exhaustive()
    }
}

/// The gateway's route table.
pub type RouteTable = Router<Route>;

/// Returns the caller's parameters: the body for `POST`/`PUT`/`PATCH`, the
/// query otherwise.
pub(crate) fn payload(ctx: &RequestContext) -> GatewayResult<Map<String, Value>> {
    let method = ctx.method();
    if *method == Method::POST || *method == Method::PUT || *method == Method::PATCH {
        match ctx.body() {
            Value::Object(map) => Ok(map.clone()),
            _ => Err(GatewayError::unknown("request body must be a JSON object")),
        }
    } else {
        Ok(ctx.query().clone())
    }
}

/// Reads a required string field.
pub(crate) fn field<'a>(payload: &'a Map<String, Value>, name: &str) -> GatewayResult<&'a str> {
    payload
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::unknown(format!("{name} is required")))
}
