//! Process-wide registry of compiled JSON schemas.
//!
//! Keys are `"{baseRoute}{subPath}"`, e.g. `messages/text`. The registry is
//! filled once at startup and shared read-only behind an `Arc`.

use std::collections::HashMap;

use hermes_core::Violation;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while building the registry.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document is not valid JSON.
    #[error("schema '{key}' is not valid JSON: {message}")]
    Parse {
        /// Registry key.
        key: String,
        /// Parser message.
        message: String,
    },

    /// The document is not a valid JSON Schema.
    #[error("schema '{key}' failed to compile: {message}")]
    Compile {
        /// Registry key.
        key: String,
        /// Compiler message.
        message: String,
    },

    /// Two schemas were registered under the same key.
    #[error("schema '{0}' is registered twice")]
    Duplicate(String),
}

/// A compiled validator plus the canonical schema it was built from.
#[derive(Debug)]
pub struct SchemaEntry {
    validator: jsonschema::Validator,
    schema: Value,
}

impl SchemaEntry {
    /// Compiles a schema.
    pub fn compile(key: &str, schema: Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| SchemaError::Compile {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { validator, schema })
    }

    /// Returns the canonical schema.
    #[must_use]
    pub const fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validates a payload and returns every violation found.
    ///
    /// The payload is never modified. An empty list means the payload is
    /// valid.
    #[must_use]
    pub fn violations(&self, payload: &Value) -> Vec<Violation> {
        self.validator
            .iter_errors(payload)
            .map(|error| {
                let schema_path = error.schema_path().to_string();
                let constraint = schema_path.rsplit('/').next().unwrap_or_default();
                Violation::new(
                    error.instance_path().to_string(),
                    constraint,
                    error.to_string(),
                )
            })
            .collect()
    }
}

/// Route key to compiled schema.
///
/// # Example
///
/// ```
/// use hermes_middleware::SchemaRegistry;
/// use serde_json::json;
///
/// let mut registry = SchemaRegistry::new();
/// registry
///     .register("messages/text", json!({
///         "type": "object",
///         "required": ["to"],
///         "properties": { "to": { "type": "string", "maxLength": 15 } }
///     }))
///     .unwrap();
///
/// let entry = registry.get("messages/text").unwrap();
/// assert!(entry.violations(&json!({"to": "15551234567"})).is_empty());
/// assert_eq!(entry.violations(&json!({}))[0].constraint, "required");
/// ```
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, SchemaEntry>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(key, json text)` pairs.
    pub fn from_documents<'a, I>(documents: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut registry = Self::new();
        for (key, text) in documents {
            registry.register_json(key, text)?;
        }
        Ok(registry)
    }

    /// Compiles and registers a schema.
    pub fn register(&mut self, key: impl Into<String>, schema: Value) -> Result<(), SchemaError> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(SchemaError::Duplicate(key));
        }
        let entry = SchemaEntry::compile(&key, schema)?;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Parses, compiles and registers a schema given as JSON text.
    pub fn register_json(&mut self, key: &str, text: &str) -> Result<(), SchemaError> {
        let schema = serde_json::from_str(text).map_err(|e| SchemaError::Parse {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.register(key, schema)
    }

    /// Looks up a schema by route key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.get(key)
    }

    /// Returns `true` if a schema is registered under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no schema is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_schema() -> Value {
        json!({
            "type": "object",
            "required": ["to", "text"],
            "additionalProperties": false,
            "properties": {
                "to": { "type": "string", "minLength": 4, "maxLength": 15 },
                "text": {
                    "type": "object",
                    "required": ["body"],
                    "properties": { "body": { "type": "string", "maxLength": 4096 } }
                }
            }
        })
    }

    #[test]
    fn test_collects_all_violations() {
        let entry = SchemaEntry::compile("messages/text", text_schema()).unwrap();
        let violations = entry.violations(&json!({
            "to": "1234567890123456",
            "text": { "body": 42 },
            "extra": true
        }));

        let constraints: Vec<_> = violations.iter().map(|v| v.constraint.as_str()).collect();
        assert!(constraints.contains(&"maxLength"), "{constraints:?}");
        assert!(constraints.contains(&"type"), "{constraints:?}");
        assert!(constraints.contains(&"additionalProperties"), "{constraints:?}");

        let too_long = violations.iter().find(|v| v.constraint == "maxLength").unwrap();
        assert_eq!(too_long.path, "/to");
        assert!(!too_long.message.is_empty());
    }

    #[test]
    fn test_validation_does_not_mutate_payload() {
        let entry = SchemaEntry::compile("messages/text", text_schema()).unwrap();
        let payload = json!({ "to": "x" });
        let before = payload.clone();
        let _ = entry.violations(&payload);
        assert_eq!(payload, before);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register("a/b", json!({})).unwrap();
        assert!(matches!(
            registry.register("a/b", json!({})),
            Err(SchemaError::Duplicate(_))
        ));
    }

    #[test]
    fn test_invalid_documents_rejected() {
        assert!(matches!(
            SchemaRegistry::from_documents([("a/b", "{not json")]),
            Err(SchemaError::Parse { .. })
        ));
        assert!(matches!(
            SchemaRegistry::from_documents([("a/b", r#"{"type": 12}"#)]),
            Err(SchemaError::Compile { .. })
        ));
    }

    #[test]
    fn test_keys_sorted() {
        let registry =
            SchemaRegistry::from_documents([("templates/list", "{}"), ("messages/text", "{}")])
                .unwrap();
        assert_eq!(registry.keys(), ["messages/text", "templates/list"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("templates/list"));
    }
}
