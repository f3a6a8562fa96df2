use chrono::{DateTime, SecondsFormat, Utc};
use common::domain::{NormalizedDocument, RawMessage};
use serde_json::{Map, Number, Value};

pub const RAW_PAYLOAD_FIELD: &str = "raw_payload";
pub const PERSON_COUNT_SOURCE_FIELD: &str = "person count";
pub const PERSON_COUNT_FIELD: &str = "person_count";
pub const ID_FIELD: &str = "id";
pub const SENSOR_ID_FIELD: &str = "sensor_id";
pub const DATE_TIME_FIELD: &str = "DateTime";
pub const RECEIVED_AT_FIELD: &str = "_received_at";
pub const TOPIC_FIELD: &str = "topic";

/// Human readable form used for the injected `DateTime` field, e.g. `19 Oct 2026 14:03:22`
const DATE_TIME_FORMAT: &str = "%d %b %Y %H:%M:%S";

/// Turns raw broker payloads into the canonical document shape.
///
/// Normalization never fails: undecodable bytes are replaced, and anything
/// that is not a JSON object is wrapped as `{ "raw_payload": <text> }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageNormalizer;

impl MessageNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, message: &RawMessage) -> NormalizedDocument {
        self.normalize_at(message, Utc::now())
    }

    /// Normalize with an explicit processing time
    pub fn normalize_at(&self, message: &RawMessage, now: DateTime<Utc>) -> NormalizedDocument {
        let text = String::from_utf8_lossy(&message.payload);

        let mut fields = match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert(RAW_PAYLOAD_FIELD.to_string(), Value::String(text.into_owned()));
                map
            }
        };

        promote_person_count(&mut fields);
        alias_sensor_id(&mut fields);

        if !fields.contains_key(DATE_TIME_FIELD) {
            fields.insert(
                DATE_TIME_FIELD.to_string(),
                Value::String(now.format(DATE_TIME_FORMAT).to_string()),
            );
        }

        // Reserved fields, never payload-controlled
        fields.insert(
            RECEIVED_AT_FIELD.to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        fields.insert(
            TOPIC_FIELD.to_string(),
            Value::String(message.topic.clone()),
        );

        NormalizedDocument::new(fields)
    }
}

fn promote_person_count(fields: &mut Map<String, Value>) {
    if fields.contains_key(PERSON_COUNT_FIELD) {
        return;
    }
    if let Some(value) = fields.remove(PERSON_COUNT_SOURCE_FIELD) {
        fields.insert(PERSON_COUNT_FIELD.to_string(), coerce_integer(value));
    }
}

fn alias_sensor_id(fields: &mut Map<String, Value>) {
    if fields.contains_key(SENSOR_ID_FIELD) {
        return;
    }
    if let Some(id) = fields.get(ID_FIELD).cloned() {
        fields.insert(SENSOR_ID_FIELD.to_string(), id);
    }
}

/// Best-effort integer coercion; values that do not convert are returned unchanged.
fn coerce_integer(value: Value) -> Value {
    let coerced = match &value {
        Value::Number(n) if n.is_i64() || n.is_u64() => None,
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match coerced {
        Some(n) => Value::Number(Number::from(n)),
        None => value,
    }
}
