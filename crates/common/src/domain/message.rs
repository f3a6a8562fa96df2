use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A message as delivered by the broker, before any decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Canonical document shape handed to storage.
///
/// Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDocument(Map<String, Value>);

impl NormalizedDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the field only when it holds a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn topic(&self) -> Option<&str> {
        self.get_str("topic")
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for NormalizedDocument {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Storage location selected for a single message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTarget {
    pub db_name: String,
    pub coll_name: String,
}

impl RouteTarget {
    pub fn new(db_name: impl Into<String>, coll_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            coll_name: coll_name.into(),
        }
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db_name, self.coll_name)
    }
}
