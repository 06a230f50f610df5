//! Record Codec
//!
//! Serialization of configuration records to and from JSON text. Both
//! storage backends persist the exact same text form.

use serde_json::{Map, Value};

use crate::error::{DecodeError, EncodeError};

/// A configuration record: string keys mapped to JSON-compatible values.
pub type ConfigRecord = Map<String, Value>;

/// Encode a record as pretty-printed JSON with a trailing newline.
pub fn encode(record: &ConfigRecord) -> Result<String, EncodeError> {
    let mut text = serde_json::to_string_pretty(record)?;
    text.push('\n');
    Ok(text)
}

/// Decode JSON text into a record.
///
/// Empty input, malformed JSON, and a `null` parse result are all
/// rejected. Any other non-object value is rejected too, since a record
/// is a key/value mapping and nothing else.
pub fn decode(text: &str) -> Result<ConfigRecord, DecodeError> {
    if text.trim().is_empty() {
        return Err(DecodeError::Empty);
    }

    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Null => Err(DecodeError::Null),
        Value::Object(record) => Ok(record),
        other => Err(DecodeError::NotAnObject {
            kind: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
