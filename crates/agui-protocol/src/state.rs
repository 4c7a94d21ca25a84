//! Shared state kept in sync between the server session and the client.
//!
//! Only the keys in [`SHARED_STATE_KEYS`] are ever read from a fragment or
//! written into the working state. Merges are shallow: a nested object under a
//! tracked key is replaced wholesale.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of fields shared with the client.
pub const SHARED_STATE_KEYS: [&str; 4] = ["location", "temperature", CURRENT_DATE_KEY, "time"];

/// Key seeded with the run's start timestamp.
pub const CURRENT_DATE_KEY: &str = "current_date";

/// Field of a tool response that may wrap a secondary payload
/// (`{ "status": "success", "data": { .. } }`).
pub const NESTED_PAYLOAD_FIELD: &str = "data";

/// Working copy of the shared state for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SharedState(Map<String, Value>);

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a working state from a session's persisted state. Unknown keys
    /// are dropped.
    pub fn from_persisted(persisted: &Map<String, Value>) -> Self {
        let mut state = Self::new();
        state.merge_object(persisted);
        state
    }

    /// Merge a fragment into the working state.
    ///
    /// Accepts an object or a JSON-encoded string holding an object; anything
    /// else (null, scalars, arrays, unparseable text) is ignored. Returns
    /// `true` when at least one tracked key changed value.
    pub fn merge(&mut self, fragment: &Value) -> bool {
        let parsed;
        let object = match fragment {
            Value::Object(object) => object,
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(object)) => {
                    parsed = object;
                    &parsed
                }
                _ => return false,
            },
            _ => return false,
        };
        self.merge_object(object)
    }

    /// Merge `payload`, then the object nested under `field` if there is one.
    ///
    /// This is a two-pass shallow merge, not a deep merge: keys nested any
    /// deeper than `field` are never absorbed.
    pub fn merge_with_nested(&mut self, payload: &Value, field: &str) -> bool {
        let top_level = self.merge(payload);
        let nested = payload
            .get(field)
            .is_some_and(|nested| self.merge(nested));
        top_level || nested
    }

    fn merge_object(&mut self, object: &Map<String, Value>) -> bool {
        let mut changed = false;
        for key in SHARED_STATE_KEYS {
            let Some(value) = object.get(key) else {
                continue;
            };
            if self.0.get(key) != Some(value) {
                self.0.insert(key.to_owned(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Stamp `current_date` with an RFC 3339 UTC timestamp.
    pub fn stamp_current_date(&mut self, at: DateTime<Utc>) -> bool {
        let value = Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true));
        if self.0.get(CURRENT_DATE_KEY) == Some(&value) {
            return false;
        }
        self.0.insert(CURRENT_DATE_KEY.to_owned(), value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Full copy of the state for a snapshot or a persisted delta.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
