//! Event payloads and queued events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned event id. Strictly increasing in insertion order.
pub type EventId = i64;

/// A fully formed event: a flat JSON object of tracker parameters.
///
/// The emitter does not interpret payloads beyond adding the sent
/// timestamp; their schema belongs to the producer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`Payload::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized JSON form.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
    }

    /// Parse a payload previously produced by [`Payload::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Length of the compact JSON encoding in bytes.
    pub fn byte_size(&self) -> usize {
        self.to_bytes().map(|b| b.len()).unwrap_or_default()
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// An event held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub id: EventId,
    pub payload: Payload,
    pub enqueued_at: DateTime<Utc>,
}
