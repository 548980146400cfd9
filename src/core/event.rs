//! The mutable request/response state threaded through one pipeline run.
//!
//! Every handler in a queue receives the Event returned by the previous
//! handler, mutates `options`/`data`, and passes it on. An Event is owned
//! by exactly one in-flight run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// CLI or programmatic inputs, keyed by option/parameter name.
    #[serde(default)]
    pub options: Map<String, Value>,
    /// Results accumulated by handlers for downstream consumers.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an Event from a programmatic value.
    ///
    /// A bare non-empty object without an `options` key is treated as the
    /// options map itself; anything else deserializes field-wise, with
    /// absent `options`/`data` defaulting to empty maps.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => {
                if !map.contains_key("options") && !map.is_empty() {
                    Ok(Self {
                        options: map,
                        data: Map::new(),
                    })
                } else {
                    Ok(serde_json::from_value(Value::Object(map))?)
                }
            }
            other => Err(Error::Validation(format!(
                "Event must be an object, got {other}"
            ))),
        }
    }

    /// Build an Event from parsed CLI input: `options` is the union of the
    /// bound option flags and the bound positional parameters.
    pub fn from_cli(options: Map<String, Value>, params: Map<String, Value>) -> Self {
        let mut merged = options;
        for (key, value) in params {
            merged.insert(key, value);
        }
        Self {
            options: merged,
            data: Map::new(),
        }
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Fetch a required string option, rejecting absent or null values.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Validation(format!("Missing required option '{key}'")))
    }

    pub fn set_data(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }
}
