//! Dotted `model.*` parameters carried with every request

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known parameter keys
pub mod keys {
    pub const NAME: &str = "model.name";
    pub const ID: &str = "model.id";
    pub const TEMPERATURE: &str = "model.temperature";
    pub const TOP_P: &str = "model.top_p";
    pub const TOP_K: &str = "model.top_k";
    pub const MAX_COMPLETION_TOKENS: &str = "model.max_completion_tokens";
    pub const MAX_TOKENS: &str = "model.max_tokens";
    pub const STOP: &str = "model.stop";
    pub const FREQUENCY_PENALTY: &str = "model.frequency_penalty";
    pub const PRESENCE_PENALTY: &str = "model.presence_penalty";
    pub const SEED: &str = "model.seed";
    pub const USER: &str = "model.user";
    pub const REASONING_EFFORT: &str = "model.reasoning_effort";
    pub const SERVICE_TIER: &str = "model.service_tier";
    pub const TOP_LOGPROBS: &str = "model.top_logprobs";
    pub const METADATA: &str = "model.metadata";
    pub const TOOL_CHOICE: &str = "model.tool_choice";
    pub const RESPONSE_FORMAT: &str = "model.response_format";
    pub const THINKING: &str = "model.thinking";
    pub const DIMENSIONS: &str = "model.dimensions";
    pub const INPUT_TYPE: &str = "model.input_type";
    pub const TOP_N: &str = "model.top_n";
}

/// Opaque typed values keyed by dotted names (`model.temperature`, ...)
///
/// Adapters read only the keys their vendor supports. Accessors are
/// lenient: numbers sent as strings and objects sent as JSON strings are
/// both accepted, and a value of the wrong shape reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelParameters(IndexMap<String, Value>);

impl ModelParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Non-empty string value; numbers and booleans are stringified
    pub fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            _ => None,
        }
    }

    /// Integer value that fits in a `u32`
    pub fn unsigned(&self, key: &str) -> Option<u32> {
        self.integer(key).and_then(|v| u32::try_from(v).ok())
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// JSON object value, parsing it from a string if needed
    pub fn object(&self, key: &str) -> Option<Map<String, Value>> {
        match self.get(key)? {
            Value::Object(map) => Some(map.clone()),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Object(map)) => Some(map),
                _ => {
                    tracing::debug!(key, "parameter is not a JSON object");
                    None
                }
            },
            _ => None,
        }
    }

    /// String-to-string map, stringifying non-string values
    pub fn string_map(&self, key: &str) -> Option<IndexMap<String, String>> {
        let object = self.object(key)?;
        Some(
            object
                .into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect(),
        )
    }

    /// List of strings; a comma-separated string is split and blanks dropped
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The `model.name` parameter
    pub fn model_name(&self) -> Option<String> {
        self.string(keys::NAME)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for ModelParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
