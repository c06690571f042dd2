//! Message records held in the event buffer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single observed bus event, as handed over by an ingestion adapter.
///
/// Records carry no sequence number; the store assigns one on arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Raw payload bytes (normally re-serialised JSON).
    pub body: Vec<u8>,
    /// Routing key the event was published with.
    pub routing_key: String,
    /// Transport headers; may be empty.
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Identity of the publisher; may be empty.
    #[serde(default)]
    pub sender: String,
}

impl IngestRecord {
    /// Creates a record with no headers and an empty sender.
    pub fn new(routing_key: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            routing_key: routing_key.into(),
            headers: Map::new(),
            sender: String::new(),
        }
    }

    /// Sets the sender.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// Adds a single header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A buffered message. Immutable once the store has created it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    /// Sequence number assigned at ingestion, starting at 0.
    pub seq: i64,
    /// Raw payload bytes.
    pub body: Vec<u8>,
    /// Routing key the event was published with.
    pub routing_key: String,
    /// When the store accepted the event.
    pub received_at: DateTime<Utc>,
    /// Identity of the publisher; may be empty.
    pub sender: String,
    /// Transport headers; may be empty.
    pub headers: Map<String, Value>,
}

impl Message {
    pub(crate) fn from_record(seq: i64, received_at: DateTime<Utc>, record: IngestRecord) -> Self {
        Self {
            seq,
            body: record.body,
            routing_key: record.routing_key,
            received_at,
            sender: record.sender,
            headers: record.headers,
        }
    }

    /// Returns a header value as a string slice, if present and a string.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(Value::as_str)
    }
}
