// src/utils/firestore.rs
//! Firestore REST/Eventarc JSON helpers.
//!
//! Firestore ships field values in a typed envelope
//! (`{"stringValue": "X"}`, `{"mapValue": {"fields": {...}}}`, ...). The
//! rest of the crate works with plain `serde_json` values, so documents are
//! flattened here once.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

/// A Firestore document as returned by the REST API and carried in
/// `google.events.cloud.firestore.v1.DocumentEventData`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Last path segment of the resource name, i.e. the document id.
    pub fn id(&self) -> Option<&str> {
        document_id(&self.name)
    }

    /// Path below the database root, e.g. `ride_requests/abc123` or
    /// `users/u1/trips/t1` for a subcollection document.
    pub fn relative_path(&self) -> Option<&str> {
        self.name.split_once("/documents/").map(|(_, path)| path)
    }

    pub fn plain_fields(&self) -> Map<String, Value> {
        decode_fields(&self.fields)
    }
}

/// Body of a Firestore document event delivered by Eventarc in JSON mode.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEventData {
    pub value: Option<Document>,
    pub old_value: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    pub next_page_token: Option<String>,
}

pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|s| !s.is_empty())
}

pub fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), decode_value(value)))
        .collect()
}

/// Converts one typed Firestore value into plain JSON. Unknown envelopes
/// are passed through untouched.
pub fn decode_value(value: &Value) -> Value {
    let Some(envelope) = value.as_object() else {
        return value.clone();
    };
    let Some((kind, inner)) = envelope.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => inner.clone(),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "integerValue" => match inner {
            Value::String(raw) => raw
                .parse::<i64>()
                .map(|n| Value::Number(Number::from(n)))
                .unwrap_or_else(|_| inner.clone()),
            other => other.clone(),
        },
        "doubleValue" => match inner {
            Value::String(raw) => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| inner.clone()),
            other => other.clone(),
        },
        "geoPointValue" => {
            let mut point = Map::new();
            for key in ["latitude", "longitude"] {
                point.insert(key.to_string(), inner.get(key).cloned().unwrap_or(Value::from(0.0)));
            }
            Value::Object(point)
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => Value::Object(decode_fields(fields)),
            None => Value::Object(Map::new()),
        },
        "arrayValue" => match inner.get("values").and_then(Value::as_array) {
            Some(values) => Value::Array(values.iter().map(decode_value).collect()),
            None => Value::Array(Vec::new()),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_value(&json!({"stringValue": "pending"})), json!("pending"));
        assert_eq!(decode_value(&json!({"booleanValue": true})), json!(true));
        assert_eq!(decode_value(&json!({"integerValue": "42"})), json!(42));
        assert_eq!(decode_value(&json!({"doubleValue": 1.5})), json!(1.5));
        assert_eq!(decode_value(&json!({"nullValue": null})), Value::Null);
    }

    #[test]
    fn test_decode_nested() {
        let typed = json!({
            "mapValue": {"fields": {
                "address": {"stringValue": "Ring Road"},
                "stops": {"arrayValue": {"values": [{"integerValue": "1"}, {"integerValue": "2"}]}}
            }}
        });
        assert_eq!(decode_value(&typed), json!({"address": "Ring Road", "stops": [1, 2]}));
    }

    #[test]
    fn test_decode_geo_point() {
        let typed = json!({"geoPointValue": {"latitude": 5.6, "longitude": -0.2}});
        assert_eq!(decode_value(&typed), json!({"latitude": 5.6, "longitude": -0.2}));
    }

    #[test]
    fn test_document_path_parts() {
        let document = Document {
            name: "projects/p/databases/(default)/documents/ride_requests/abc123".to_string(),
            fields: Map::new(),
        };
        assert_eq!(document.id(), Some("abc123"));
        assert_eq!(document.relative_path(), Some("ride_requests/abc123"));
        assert_eq!(document_id(""), None);
        assert_eq!(Document::default().relative_path(), None);
    }
}
