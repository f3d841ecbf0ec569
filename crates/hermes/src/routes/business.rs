//! Business routes forwarded to the Graph API.
//!
//! Each route is a [`Forward`]: a method, a gateway path and a builder that
//! turns the validated caller parameters into an [`UpstreamRequest`]. The
//! handler is shared by every forward:
//!
//! 1. read the parameters (body for `POST`, query otherwise)
//! 2. decrypt the caller's `token` into the provider access token
//! 3. build and send the provider call
//! 4. return the provider's answer as the response data
//!
//! Path segments taken from the caller (`phoneNumberId`, `wabaId`,
//! `templateId`) must be a single plain segment.

use std::sync::Arc;

use hermes_core::{BoxFuture, GatewayError, GatewayResult, Handler, RequestContext, TokenCipher, Violation};
use hermes_middleware::Pipeline;
use http::Method;
use serde_json::{json, Map, Value};

use super::{field, payload, Route, RouteTable};
use crate::upstream::{UpstreamProxy, UpstreamRequest};

/// Fields requested when viewing a phone number.
pub const PHONE_NUMBER_FIELDS: &str =
    "verified_name,code_verification_status,display_phone_number,quality_rating,id,name_status";

/// Fields requested when reading a business profile.
pub const BUSINESS_PROFILE_FIELDS: &str =
    "about,address,description,email,profile_picture_url,websites,vertical";

/// Page size for list calls.
const LIST_LIMIT: &str = "1000";

type Build = fn(&Map<String, Value>) -> GatewayResult<UpstreamRequest>;

/// A gateway route forwarded to the provider.
#[derive(Clone)]
pub struct Forward {
    method: Method,
    path: &'static str,
    build: Build,
}

impl Forward {
    fn new(method: Method, path: &'static str, build: Build) -> Self {
        Self { method, path, build }
    }

    /// Returns the HTTP method.
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the gateway path, e.g. `/messages/text`.
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// Builds the provider call, without credentials, from caller parameters.
    pub fn build(&self, payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
        (self.build)(payload)
    }

    /// Returns the schema key for this route, e.g. `messages/text`.
    pub fn route_key(&self) -> &'static str {
        self.path.trim_start_matches('/')
    }
}

impl std::fmt::Debug for Forward {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forward")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Every business forward.
pub fn forwards() -> Vec<Forward> {
    vec![
        // messages
        Forward::new(Method::POST, "/messages/text", text_message),
        Forward::new(Method::POST, "/messages/textWithUrl", text_message),
        Forward::new(Method::POST, "/messages/textReply", text_reply),
        Forward::new(Method::POST, "/messages/textReplyWithUrl", text_reply),
        Forward::new(Method::POST, "/messages/reactionReply", reaction_reply),
        Forward::new(Method::POST, "/messages/image", image_message),
        Forward::new(Method::POST, "/messages/imageReply", image_reply),
        // phoneNumbers
        Forward::new(Method::GET, "/phoneNumbers/list", list_phone_numbers),
        Forward::new(Method::GET, "/phoneNumbers/view", view_phone_number),
        Forward::new(Method::POST, "/phoneNumbers/verifyCode", verify_code),
        Forward::new(Method::POST, "/phoneNumbers/requestCode", request_code),
        Forward::new(Method::POST, "/phoneNumbers/registerPhone", register_phone),
        Forward::new(Method::POST, "/phoneNumbers/deRegisterPhone", deregister_phone),
        Forward::new(Method::POST, "/phoneNumbers/setTwoStepVerificationCode", set_two_step_pin),
        Forward::new(Method::GET, "/phoneNumbers/getBusinessProfile", get_business_profile),
        Forward::new(Method::POST, "/phoneNumbers/updateBusinessProfile", update_business_profile),
        // templates
        Forward::new(Method::GET, "/templates/list", list_templates),
        Forward::new(Method::GET, "/templates/view", view_template),
        Forward::new(Method::GET, "/templates/viewBy", view_templates_by),
        Forward::new(Method::POST, "/templates/create", create_template),
        Forward::new(Method::POST, "/templates/message", template_message),
        Forward::new(Method::GET, "/templates/namespace", template_namespace),
        Forward::new(Method::DELETE, "/templates/deleteById", delete_template_by_id),
        Forward::new(Method::DELETE, "/templates/deleteByName", delete_template_by_name),
    ]
}

/// Adds every forward to the route table.
pub fn mount(
    table: &mut RouteTable,
    pipeline: &Arc<Pipeline>,
    cipher: &Arc<TokenCipher>,
    upstream: &Arc<dyn UpstreamProxy>,
) {
    for forward in forwards() {
        let method = forward.method.clone();
        let path = forward.path;
        let handler = ForwardHandler::new(forward, Arc::clone(cipher), Arc::clone(upstream));
        table.add_route(method, path, Route::new(Arc::clone(pipeline), Arc::new(handler)));
    }
}

/// Runs one [`Forward`].
pub struct ForwardHandler {
    forward: Forward,
    cipher: Arc<TokenCipher>,
    upstream: Arc<dyn UpstreamProxy>,
}

impl ForwardHandler {
    /// Creates a handler for a forward.
    pub fn new(forward: Forward, cipher: Arc<TokenCipher>, upstream: Arc<dyn UpstreamProxy>) -> Self {
        Self {
            forward,
            cipher,
            upstream,
        }
    }
}

impl Handler for ForwardHandler {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, GatewayResult<Value>> {
        Box::pin(async move {
            let params = payload(ctx)?;
            let access_token = self.cipher.decrypt(field(&params, "token")?).map_err(|e| {
                tracing::warn!(request_id = %ctx.request_id(), error = %e, "caller token could not be decrypted");
                GatewayError::from(e)
            })?;

            let request = self.forward.build(&params)?.bearer(access_token);
            tracing::debug!(
                request_id = %ctx.request_id(),
                route = self.forward.route_key(),
                upstream_path = %request.path,
                "forwarding to provider"
            );
            self.upstream.call(request).await
        })
    }
}

/// Reads a caller field used as a provider path segment.
fn segment<'a>(payload: &'a Map<String, Value>, name: &str) -> GatewayResult<&'a str> {
    let value = field(payload, name)?;
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        Ok(value)
    } else {
        Err(GatewayError::validation(vec![Violation::new(
            format!("/{name}"),
            "pattern",
            format!("{name} must be a single path segment"),
        )]))
    }
}

/// The payload without `drop` keys and without `null` values.
fn without(payload: &Map<String, Value>, drop: &[&str]) -> Value {
    Value::Object(
        payload
            .iter()
            .filter(|(key, value)| !drop.contains(&key.as_str()) && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}

/// A message to `to`, copying the `parts` objects from the payload.
fn message(payload: &Map<String, Value>, kind: &str, parts: &[&str]) -> GatewayResult<UpstreamRequest> {
    let phone_number_id = segment(payload, "phoneNumberId")?;
    let mut body = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": field(payload, "to")?,
        "type": kind,
    });
    for part in parts {
        let value = payload
            .get(*part)
            .cloned()
            .ok_or_else(|| GatewayError::unknown(format!("{part} is required")))?;
        body[*part] = value;
    }
    Ok(UpstreamRequest::post(format!("/{phone_number_id}/messages")).json(body))
}

fn text_message(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    message(payload, "text", &["text"])
}

fn text_reply(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    message(payload, "text", &["context", "text"])
}

fn reaction_reply(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    message(payload, "reaction", &["reaction"])
}

fn image_message(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    message(payload, "image", &["image"])
}

fn image_reply(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    message(payload, "image", &["image", "context"])
}

fn list_phone_numbers(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::get(format!("/{waba_id}/phone_numbers")).query("limit", LIST_LIMIT))
}

fn view_phone_number(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::get(format!("/{id}")).query("fields", PHONE_NUMBER_FIELDS))
}

fn phone_number_post(payload: &Map<String, Value>, body: Value) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::post(format!("/{id}")).json(body))
}

fn verify_code(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    phone_number_post(payload, json!({ "code": field(payload, "code")? }))
}

fn request_code(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    phone_number_post(
        payload,
        json!({
            "code_method": field(payload, "code_method")?,
            "language": field(payload, "language")?,
        }),
    )
}

fn register_phone(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    phone_number_post(
        payload,
        json!({ "messaging_product": "whatsapp", "pin": field(payload, "pin")? }),
    )
}

fn deregister_phone(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::post(format!("/{id}")))
}

fn set_two_step_pin(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    phone_number_post(payload, json!({ "pin": field(payload, "pin")? }))
}

fn get_business_profile(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::get(format!("/{id}/whatsapp_business_profile"))
        .query("fields", BUSINESS_PROFILE_FIELDS))
}

fn update_business_profile(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::post(format!("/{id}/whatsapp_business_profile"))
        .json(without(payload, &["token", "phoneNumberId"])))
}

fn list_templates(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::get(format!("/{waba_id}/message_templates")).query("limit", LIST_LIMIT))
}

fn view_template(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "templateId")?;
    Ok(UpstreamRequest::get(format!("/{id}")))
}

fn view_templates_by(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    let mut request = UpstreamRequest::get(format!("/{waba_id}/message_templates"));
    if let Value::Object(filters) = without(payload, &["wabaId", "token"]) {
        for (name, value) in filters {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            request = request.query(name, value);
        }
    }
    Ok(request)
}

fn create_template(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::post(format!("/{waba_id}/message_templates"))
        .json(without(payload, &["wabaId", "token"])))
}

fn template_message(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let id = segment(payload, "phoneNumberId")?;
    Ok(UpstreamRequest::post(format!("/{id}/messages"))
        .json(without(payload, &["phoneNumberId", "token"])))
}

fn template_namespace(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::get(format!("/{waba_id}")).query("fields", "message_template_namespace"))
}

fn delete_template_by_id(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::delete(format!("/{waba_id}/message_templates"))
        .query("name", field(payload, "templateName")?)
        .query("hsm_id", field(payload, "templateId")?))
}

fn delete_template_by_name(payload: &Map<String, Value>) -> GatewayResult<UpstreamRequest> {
    let waba_id = segment(payload, "wabaId")?;
    Ok(UpstreamRequest::delete(format!("/{waba_id}/message_templates"))
        .query("name", field(payload, "templateName")?))
}
