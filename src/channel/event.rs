use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// An event flowing through a channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Declared data type; transformers convert between types
    pub data_type: String,
    pub payload: JsonValue,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Event {
    pub fn new(data_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            data_type: data_type.into(),
            payload,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}
