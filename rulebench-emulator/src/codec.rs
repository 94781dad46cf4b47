//! Conversion between plain JSON field values and the emulator's typed
//! value encoding (`{"stringValue": "..."}`, `{"integerValue": "1"}`, ...).

use rulebench_core::{BackendError, Document, DocumentPath, Fields, Result};
use serde_json::{Map, Number, Value, json};

/// Encode a plain JSON value as a typed value.
///
/// Integers must fit in an `i64`; larger ones are rejected rather than
/// stored as a lossy double.
pub fn encode_value(value: &Value) -> Result<Value> {
    Ok(match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => encode_number(n)?,
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values = items.iter().map(encode_value).collect::<Result<Vec<_>>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_map(map)? } }),
    })
}

fn encode_number(n: &Number) -> Result<Value> {
    if let Some(i) = n.as_i64() {
        return Ok(json!({ "integerValue": i.to_string() }));
    }
    if n.is_u64() {
        return Err(BackendError::Codec(format!(
            "integer {} does not fit in a signed 64-bit integerValue",
            n
        )));
    }
    n.as_f64()
        .map(|f| json!({ "doubleValue": f }))
        .ok_or_else(|| BackendError::Codec(format!("unrepresentable number {}", n)))
}

fn encode_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Result<Value> {
    let encoded = entries
        .into_iter()
        .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
        .collect::<Result<Map<String, Value>>>()?;
    Ok(Value::Object(encoded))
}

/// Encode document fields into the `fields` object of a request body.
pub fn encode_fields(fields: &Fields) -> Result<Value> {
    encode_map(fields)
}

/// Decode a typed value into plain JSON.
///
/// Timestamps, references and bytes decode to their string form; geo points
/// to `{"latitude", "longitude"}`.
pub fn decode_value(value: &Value) -> Result<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| BackendError::Codec(format!("typed value must be an object: {}", value)))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| BackendError::Codec("typed value has no type tag".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| BackendError::Codec(format!("bad booleanValue: {}", inner))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| BackendError::Codec(format!("bad integerValue: {}", inner)))
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| BackendError::Codec(format!("unrepresentable doubleValue: {}", inner))),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| BackendError::Codec(format!("bad {}: {}", kind, inner))),
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(Value::Null),
            "longitude": inner.get("longitude").cloned().unwrap_or(Value::Null),
        })),
        "arrayValue" => {
            let values = inner.get("values").and_then(Value::as_array);
            let decoded = values
                .map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(decoded))
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(fields) => decode_fields(fields)?,
                None => Fields::new(),
            };
            Ok(Value::Object(fields.into_iter().collect()))
        }
        other => Err(BackendError::Codec(format!("unknown value type '{}'", other))),
    }
}

/// Decode the `fields` object of a document.
pub fn decode_fields(fields: &Value) -> Result<Fields> {
    let obj = fields
        .as_object()
        .ok_or_else(|| BackendError::Codec("document fields must be an object".to_string()))?;
    obj.iter().map(|(k, v)| Ok((k.clone(), decode_value(v)?))).collect()
}

/// Decode a document resource. Its `name` is
/// `projects/{p}/databases/{db}/documents/{path}`.
pub fn decode_document(resource: &Value) -> Result<Document> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::Codec("document resource has no name".to_string()))?;
    let (_, path) = name.split_once("/documents/").ok_or_else(|| {
        BackendError::Codec(format!("document name '{}' has no documents segment", name))
    })?;
    let path = DocumentPath::parse(path)?;
    let fields = match resource.get("fields") {
        Some(fields) => decode_fields(fields)?,
        None => Fields::new(),
    };
    Ok(Document::new(path, fields))
}

/// Quote a field name for use in an update mask when it is not a plain
/// identifier.
pub fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        field.to_string()
    } else {
        format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
