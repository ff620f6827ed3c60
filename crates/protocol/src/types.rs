//! Core types shared across the sync pipeline

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Connection lifecycle state (owned by the reconnection supervisor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(label)
    }
}

/// Key holding a top-level array payload once it is stored as a record.
pub const ARRAY_PAYLOAD_KEY: &str = "items";

/// Key injected into every record with the arrival time in milliseconds.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// A decoded structured frame plus its arrival timestamp.
///
/// Immutable once built. Object payloads keep their fields as-is (a payload
/// `timestamp` field is overwritten by the arrival time); array payloads are
/// stored under [`ARRAY_PAYLOAD_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(flatten)]
    fields: Map<String, Value>,
    timestamp: i64,
}

impl StreamRecord {
    /// Build a record from a decoded payload. Returns `None` for scalars.
    pub fn from_value(value: Value, timestamp: i64) -> Option<Self> {
        let mut fields = match value {
            Value::Object(map) => map,
            Value::Array(items) => {
                let mut map = Map::new();
                map.insert(ARRAY_PAYLOAD_KEY.to_string(), Value::Array(items));
                map
            }
            _ => return None,
        };
        fields.remove(TIMESTAMP_KEY);
        Some(Self { fields, timestamp })
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// The record as a single JSON object, timestamp included.
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(TIMESTAMP_KEY.to_string(), Value::from(self.timestamp));
        Value::Object(map)
    }
}

/// The persisted subset of UI state. Only these keys are ever written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistableState {
    pub count: i64,
    pub input_text: String,
    pub todos: Vec<String>,
    pub completed: Vec<String>,
}

/// Category of a frame that did not decode as structured data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    Empty,
    SseData,
    SseEvent,
    SseId,
    SseRetry,
    Heartbeat,
    Comment,
    HtmlPage,
    MarkupFragment,
    ErrorMessage,
    ConnectionMessage,
    Numeric,
    PlainText,
}

impl NoiseKind {
    /// True for `data:`, `event:`, `id:` and `retry:` lines.
    pub fn is_sse_control(self) -> bool {
        matches!(
            self,
            NoiseKind::SseData | NoiseKind::SseEvent | NoiseKind::SseId | NoiseKind::SseRetry
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            NoiseKind::Empty => "empty/whitespace",
            NoiseKind::SseData => "SSE data line",
            NoiseKind::SseEvent => "SSE event line",
            NoiseKind::SseId => "SSE id line",
            NoiseKind::SseRetry => "SSE retry line",
            NoiseKind::Heartbeat => "SSE comment/heartbeat",
            NoiseKind::Comment => "SSE comment",
            NoiseKind::HtmlPage => "HTML page",
            NoiseKind::MarkupFragment => "XML/HTML fragment",
            NoiseKind::ErrorMessage => "error message",
            NoiseKind::ConnectionMessage => "connection message",
            NoiseKind::Numeric => "numeric string",
            NoiseKind::PlainText => "plain text",
        }
    }
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of classifying one raw frame
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Structured(StreamRecord),
    Noise(NoiseKind),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_payload_timestamp_is_overwritten() {
        let record = StreamRecord::from_value(json!({"a": 1, "timestamp": "old"}), 42).unwrap();
        assert_eq!(record.get("a"), Some(&json!(1)));
        assert_eq!(record.get(TIMESTAMP_KEY), None);
        assert_eq!(record.to_json(), json!({"a": 1, "timestamp": 42}));
    }

    #[test]
    fn array_payload_is_wrapped() {
        let record = StreamRecord::from_value(json!([1, 2]), 7).unwrap();
        assert_eq!(record.get(ARRAY_PAYLOAD_KEY), Some(&json!([1, 2])));
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"items": [1, 2], "timestamp": 7}));
    }

    #[test]
    fn scalar_payload_is_rejected() {
        assert!(StreamRecord::from_value(json!(5), 1).is_none());
        assert!(StreamRecord::from_value(json!("text"), 1).is_none());
        assert!(StreamRecord::from_value(Value::Null, 1).is_none());
    }

    #[test]
    fn persistable_state_uses_snake_case_keys() {
        let state = PersistableState {
            count: 3,
            input_text: "milk".into(),
            todos: vec!["a".into()],
            completed: vec![],
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({"count": 3, "input_text": "milk", "todos": ["a"], "completed": []})
        );
    }
}
