//! Payload schemas bundled into the binary.
//!
//! One JSON Schema document per validated route, keyed like the route
//! (`messages/text` validates `POST /messages/text`).

use hermes_middleware::{SchemaError, SchemaRegistry};

/// Every bundled `(route key, schema document)` pair.
pub const DOCUMENTS: &[(&str, &str)] = &[
    ("messages/image", include_str!("../schemas/messages/image.json")),
    ("messages/imageReply", include_str!("../schemas/messages/imageReply.json")),
    ("messages/reactionReply", include_str!("../schemas/messages/reactionReply.json")),
    ("messages/text", include_str!("../schemas/messages/text.json")),
    ("messages/textReply", include_str!("../schemas/messages/textReply.json")),
    ("messages/textReplyWithUrl", include_str!("../schemas/messages/textReplyWithUrl.json")),
    ("messages/textWithUrl", include_str!("../schemas/messages/textWithUrl.json")),
    ("phoneNumbers/deRegisterPhone", include_str!("../schemas/phoneNumbers/deRegisterPhone.json")),
    ("phoneNumbers/getBusinessProfile", include_str!("../schemas/phoneNumbers/getBusinessProfile.json")),
    ("phoneNumbers/list", include_str!("../schemas/phoneNumbers/list.json")),
    ("phoneNumbers/registerPhone", include_str!("../schemas/phoneNumbers/registerPhone.json")),
    ("phoneNumbers/requestCode", include_str!("../schemas/phoneNumbers/requestCode.json")),
    ("phoneNumbers/setTwoStepVerificationCode", include_str!("../schemas/phoneNumbers/setTwoStepVerificationCode.json")),
    ("phoneNumbers/updateBusinessProfile", include_str!("../schemas/phoneNumbers/updateBusinessProfile.json")),
    ("phoneNumbers/verifyCode", include_str!("../schemas/phoneNumbers/verifyCode.json")),
    ("phoneNumbers/view", include_str!("../schemas/phoneNumbers/view.json")),
    ("templates/create", include_str!("../schemas/templates/create.json")),
    ("templates/deleteById", include_str!("../schemas/templates/deleteById.json")),
    ("templates/deleteByName", include_str!("../schemas/templates/deleteByName.json")),
    ("templates/list", include_str!("../schemas/templates/list.json")),
    ("templates/message", include_str!("../schemas/templates/message.json")),
    ("templates/namespace", include_str!("../schemas/templates/namespace.json")),
    ("templates/view", include_str!("../schemas/templates/view.json")),
    ("templates/viewBy", include_str!("../schemas/templates/viewBy.json")),
    ("merchant/signUp", include_str!("../schemas/merchant/signUp.json")),
];

/// Compiles every bundled schema into a registry.
pub fn registry() -> Result<SchemaRegistry, SchemaError> {
    SchemaRegistry::from_documents(DOCUMENTS.iter().copied())
}
