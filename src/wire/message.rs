//! Request/response messages carried by invocation chains

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Message body. A `Fault` is a business fault raised by the target
/// operation; it travels back through the chain as a normal result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "lowercase")]
pub enum Payload {
    #[default]
    Empty,
    Value(JsonValue),
    Fault(JsonValue),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    payload: Payload,
    #[serde(default)]
    headers: HashMap<String, String>,
    correlation_id: Uuid,
    operation: Option<String>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Payload::Empty)
    }
}

impl Message {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            headers: HashMap::new(),
            correlation_id: Uuid::new_v4(),
            operation: None,
        }
    }

    pub fn value(value: JsonValue) -> Self {
        Self::new(Payload::Value(value))
    }

    pub fn fault(fault: JsonValue) -> Self {
        Self::new(Payload::Fault(fault))
    }

    /// Build the response to this message, keeping its correlation id,
    /// operation and headers.
    pub fn reply(&self, payload: Payload) -> Self {
        Self {
            payload,
            headers: self.headers.clone(),
            correlation_id: self.correlation_id,
            operation: self.operation.clone(),
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// The JSON body of a value or fault payload
    pub fn body(&self) -> Option<&JsonValue> {
        match &self.payload {
            Payload::Value(v) | Payload::Fault(v) => Some(v),
            Payload::Empty => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.payload, Payload::Fault(_))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Operation this message was dispatched to, set by the chain
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub(crate) fn set_operation(&mut self, operation: &str) {
        self.operation = Some(operation.to_string());
    }
}
