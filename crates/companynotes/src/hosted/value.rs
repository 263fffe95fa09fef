//! Codec between plain JSON records and typed document values.
//!
//! The document service wraps every field in a single-key object naming its
//! type (`{"stringValue": "…"}`, `{"integerValue": "42"}`, …). Records are
//! converted through `serde_json::Value` so any `Serialize` type can be stored.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Encode one JSON value as a typed document value.
#[must_use]
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

/// Encode every entry of a JSON object.
#[must_use]
pub fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect()
}

/// Decode one typed document value into plain JSON.
///
/// # Errors
///
/// Returns [`Error::MalformedDocument`] for unknown or ill-formed types.
pub fn decode_value(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(malformed(format!("expected a typed value, got {value}")));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed(format!("bad booleanValue {inner}"))),
        "integerValue" => parse_integer(inner).map(Value::from),
        "doubleValue" => inner
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| malformed(format!("bad doubleValue {inner}"))),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed(format!("bad {kind} {inner}"))),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values: Vec<Value> = match inner.get("values") {
                Some(Value::Array(values)) => values.iter().map(decode_value).collect(),
                Some(other) => Err(malformed(format!("bad arrayValue {other}"))),
                None => Ok(Vec::new()),
            }?;
            Ok(Value::Array(values))
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => decode_fields(fields).map(Value::Object),
            Some(other) => Err(malformed(format!("bad mapValue {other}"))),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(malformed(format!("unsupported value type {other}"))),
    }
}

/// Decode every entry of a document's `fields` map.
///
/// # Errors
///
/// Returns [`Error::MalformedDocument`] if any field fails to decode.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Encode a record as a document body (`{"fields": {…}}`).
///
/// # Errors
///
/// Returns an error if the record does not serialize to a JSON object.
pub fn to_document<T: Serialize>(record: &T) -> Result<Value> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(json!({ "fields": encode_fields(&fields) })),
        other => Err(malformed(format!("records must be objects, got {other}"))),
    }
}

/// Decode a document's `fields` map into a record.
///
/// # Errors
///
/// Returns an error if decoding or deserialization fails.
pub fn from_fields<T: DeserializeOwned>(fields: &Map<String, Value>) -> Result<T> {
    let plain = decode_fields(fields)?;
    serde_json::from_value(Value::Object(plain))
        .map_err(|e| malformed(format!("document does not match record: {e}")))
}

/// Integers travel as decimal strings, but accept bare numbers too.
fn parse_integer(inner: &Value) -> Result<i64> {
    match inner {
        Value::String(s) => s
            .parse()
            .map_err(|_| malformed(format!("bad integerValue {s:?}"))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| malformed(format!("bad integerValue {n}"))),
        other => Err(malformed(format!("bad integerValue {other}"))),
    }
}

fn malformed(message: String) -> Error {
    Error::MalformedDocument(message)
}
