//! Typed view over a messages request body.
//!
//! Fields the rewriter touches are pulled out of the JSON object into typed
//! slots; everything else stays in an untouched bag. Serialization walks the
//! original key order so unknown content round-trips as it arrived, with
//! keys introduced by the rewriter appended at the end.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use super::TransformError;

const MODEL: &str = "model";
const MESSAGES: &str = "messages";
const SYSTEM: &str = "system";
const METADATA: &str = "metadata";
const TEMPERATURE: &str = "temperature";
const TOP_P: &str = "top_p";
const MAX_TOKENS: &str = "max_tokens";

/// Known fields in the order they are emitted when absent from the input.
const KNOWN_FIELDS: [&str; 7] = [
    MODEL,
    MESSAGES,
    SYSTEM,
    METADATA,
    TEMPERATURE,
    TOP_P,
    MAX_TOKENS,
];

#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub model: Option<Value>,
    pub messages: Option<Value>,
    /// Always an array when present; enforced at construction.
    pub system: Option<Vec<Value>>,
    pub metadata: Option<Value>,
    pub temperature: Option<Value>,
    pub top_p: Option<Value>,
    pub max_tokens: Option<Value>,
    extra: Map<String, Value>,
    key_order: Vec<String>,
}

impl RequestBody {
    /// Split a JSON object into known and unknown fields.
    ///
    /// Fails with [`TransformError::FormatAnomaly`] when `system` is present
    /// but not an array.
    pub fn from_map(map: Map<String, Value>) -> Result<Self, TransformError> {
        let mut body = RequestBody {
            key_order: map.keys().cloned().collect(),
            ..Default::default()
        };

        for (key, value) in map {
            match key.as_str() {
                MODEL => body.model = Some(value),
                MESSAGES => body.messages = Some(value),
                SYSTEM => match value {
                    Value::Array(items) => body.system = Some(items),
                    _ => return Err(TransformError::FormatAnomaly),
                },
                METADATA => body.metadata = Some(value),
                TEMPERATURE => body.temperature = Some(value),
                TOP_P => body.top_p = Some(value),
                MAX_TOKENS => body.max_tokens = Some(value),
                _ => {
                    body.extra.insert(key, value);
                }
            }
        }

        Ok(body)
    }

    /// The model name, when `model` is a string.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().and_then(Value::as_str)
    }

    /// A field the rewriter does not interpret.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    fn known_value(&self, key: &str) -> Option<&Value> {
        match key {
            MODEL => self.model.as_ref(),
            MESSAGES => self.messages.as_ref(),
            METADATA => self.metadata.as_ref(),
            TEMPERATURE => self.temperature.as_ref(),
            TOP_P => self.top_p.as_ref(),
            MAX_TOKENS => self.max_tokens.as_ref(),
            _ => None,
        }
    }

    fn serialize_known<M: SerializeMap>(&self, key: &str, map: &mut M) -> Result<(), M::Error> {
        if key == SYSTEM {
            if let Some(system) = &self.system {
                map.serialize_entry(key, system)?;
            }
        } else if let Some(value) = self.known_value(key) {
            map.serialize_entry(key, value)?;
        }
        Ok(())
    }
}

impl Serialize for RequestBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        for key in &self.key_order {
            if KNOWN_FIELDS.contains(&key.as_str()) {
                self.serialize_known(key, &mut map)?;
            } else if let Some(value) = self.extra.get(key) {
                map.serialize_entry(key, value)?;
            }
        }

        for key in KNOWN_FIELDS {
            if !self.key_order.iter().any(|k| k == key) {
                self.serialize_known(key, &mut map)?;
            }
        }

        map.end()
    }
}
