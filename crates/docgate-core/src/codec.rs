//! Extended JSON codec
//!
//! Plain JSON maps onto the document value model directly. Domain types
//! travel as single-purpose wrapper objects:
//!
//! | Type | Wire form |
//! |------|-----------|
//! | object id | `{"$oid": "<24 hex>"}` |
//! | date | `{"$date": <millis>}` (decode also takes RFC 3339) |
//! | regex | `{"$regex": "<pattern>", "$options": "<flags>"}` |
//! | binary | `{"$binary": "<base64>", "$type": "<hex byte>"}` |
//! | int64 | `{"$numberLong": "<digits>"}` (decode only) |
//! | ordered map | `{"$ordered": [{"key": k, "value": v}, ...]}` (decode only) |
//!
//! Wrappers with missing or mistyped fields decode as plain documents.
//!
//! The wrapper keys are reserved. A user document whose keys are exactly
//! those of a wrapper, with well-formed values, decodes as the domain type:
//! `{"$oid": "<24 hex>"}` is always an object id, never a one-field document.

use crate::{GatewayError, Result};
use base64::{engine::general_purpose, Engine as _};
use docgate_store::{Document, ObjectId, Value};
use serde_json::{Map, Number, Value as Json};

/// Order-preserving wrapper key
pub const ORDERED_KEY: &str = "$ordered";

/// Accepted alias for [`ORDERED_KEY`]
const ORDERED_ALIAS: &str = "$pyhint";

/// Decode any JSON text
pub fn decode(text: &str) -> Result<Value> {
    let json: Json = serde_json::from_str(text).map_err(|_| GatewayError::Parse {
        input: text.to_string(),
    })?;
    Ok(from_json(json))
}

/// Decode JSON text whose top level must be an object or an array
pub fn decode_iterable(text: &str) -> Result<Value> {
    match decode(text)? {
        v @ (Value::Document(_) | Value::Array(_)) => Ok(v),
        _ => Err(GatewayError::Shape {
            expected: "iterable",
            input: text.to_string(),
        }),
    }
}

/// Decode JSON text whose top level must be an object
pub fn decode_document(text: &str) -> Result<Document> {
    match decode_iterable(text)? {
        Value::Document(doc) => Ok(doc),
        _ => Err(GatewayError::Shape {
            expected: "an object",
            input: text.to_string(),
        }),
    }
}

/// Decode one object or an array of objects
pub fn decode_documents(text: &str) -> Result<Vec<Document>> {
    let shape_error = || GatewayError::Shape {
        expected: "an object or an array of objects",
        input: text.to_string(),
    };

    match decode_iterable(text)? {
        Value::Document(doc) => Ok(vec![doc]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Document(doc) => Ok(doc),
                _ => Err(shape_error()),
            })
            .collect(),
        _ => Err(shape_error()),
    }
}

/// Encode a value as compact JSON text
pub fn encode(value: &Value) -> String {
    to_json(value).to_string()
}

/// Encode a document as compact JSON text
pub fn encode_document(doc: &Document) -> String {
    Json::Object(document_to_json(doc)).to_string()
}

/// Convert parsed JSON into the value model, unwrapping domain types
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => number_to_value(&n),
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        Json::Object(map) => match unwrap_domain(&map) {
            Some(value) => value,
            None => Value::Document(
                map.into_iter()
                    .map(|(k, v)| (k, from_json(v)))
                    .collect(),
            ),
        },
    }
}

fn number_to_value(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        i32::try_from(i).map(Value::Int32).unwrap_or(Value::Int64(i))
    } else {
        Value::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Recognize a wrapper object. `None` means "treat as a plain document".
fn unwrap_domain(map: &Map<String, Json>) -> Option<Value> {
    let only = |key: &str| map.len() == 1 && map.contains_key(key);

    if only("$oid") {
        let oid = ObjectId::parse_str(map.get("$oid")?.as_str()?)?;
        return Some(Value::ObjectId(oid));
    }

    if only("$date") {
        return match map.get("$date")? {
            Json::Number(n) => n.as_i64().map(Value::DateTime),
            Json::String(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| Value::DateTime(dt.timestamp_millis())),
            Json::Object(inner) if inner.len() == 1 => inner
                .get("$numberLong")?
                .as_str()?
                .parse()
                .ok()
                .map(Value::DateTime),
            _ => None,
        };
    }

    if map.contains_key("$regex") && map.keys().all(|k| k == "$regex" || k == "$options") {
        let pattern = map.get("$regex")?.as_str()?.to_string();
        let options = match map.get("$options") {
            Some(o) => o.as_str()?.to_string(),
            None => String::new(),
        };
        return Some(Value::Regex { pattern, options });
    }

    if map.len() == 2 && map.contains_key("$binary") && map.contains_key("$type") {
        let bytes = general_purpose::STANDARD
            .decode(map.get("$binary")?.as_str()?)
            .ok()?;
        let subtype = u8::from_str_radix(map.get("$type")?.as_str()?, 16).ok()?;
        return Some(Value::Binary { subtype, bytes });
    }

    if only("$numberLong") {
        return map.get("$numberLong")?.as_str()?.parse().ok().map(Value::Int64);
    }

    for key in [ORDERED_KEY, ORDERED_ALIAS] {
        if only(key) {
            return unwrap_ordered(map.get(key)?.as_array()?).map(Value::Document);
        }
    }

    None
}

fn unwrap_ordered(pairs: &[Json]) -> Option<Document> {
    let mut doc = Document::with_capacity(pairs.len());
    for pair in pairs {
        let pair = pair.as_object()?;
        let key = pair.get("key")?.as_str()?;
        let value = pair.get("value")?;
        doc.insert(key.to_string(), from_json(value.clone()));
    }
    Some(doc)
}

/// Convert a value into JSON, wrapping domain types
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int32(i) => Json::from(*i),
        Value::Int64(i) => Json::from(*i),
        Value::Double(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Document(doc) => Json::Object(document_to_json(doc)),
        Value::ObjectId(oid) => wrapper(&[("$oid", Json::String(oid.to_hex()))]),
        Value::DateTime(millis) => wrapper(&[("$date", Json::from(*millis))]),
        Value::Regex { pattern, options } => wrapper(&[
            ("$regex", Json::String(pattern.clone())),
            ("$options", Json::String(options.clone())),
        ]),
        Value::Binary { subtype, bytes } => wrapper(&[
            ("$binary", Json::String(general_purpose::STANDARD.encode(bytes))),
            ("$type", Json::String(format!("{subtype:02x}"))),
        ]),
    }
}

fn document_to_json(doc: &Document) -> Map<String, Json> {
    doc.iter().map(|(k, v)| (k.clone(), to_json(v))).collect()
}

fn wrapper(fields: &[(&str, Json)]) -> Json {
    Json::Object(
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}
