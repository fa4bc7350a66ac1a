//! Mirror value type and its host-store string form

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::{LocalsError, Result};

/// A mirror entry value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
  /// Raw string, stored verbatim in the host store
  Text(String),
  /// Object, array or null, JSON-encoded in the host store
  Structured(serde_json::Value),
}

impl Value {
  /// Build a value from an arbitrary JSON value written under `key`.
  ///
  /// JSON strings become `Text`; objects, arrays and null become
  /// `Structured`; numbers and booleans are rejected.
  pub fn from_json(key: &str, json: serde_json::Value) -> Result<Self> {
    match json {
      serde_json::Value::String(s) => Ok(Value::Text(s)),
      v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_) | serde_json::Value::Null) => {
        Ok(Value::Structured(v))
      }
      other => Err(LocalsError::UnsupportedValueType {
        key: key.to_string(),
        kind: json_kind(&other),
      }),
    }
  }

  /// String form as stored in the host store
  pub fn encode(&self) -> Cow<'_, str> {
    match self {
      Value::Text(s) => Cow::Borrowed(s),
      Value::Structured(v) => Cow::Owned(v.to_string()),
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Value::Text(s) => Some(s),
      Value::Structured(_) => None,
    }
  }

  pub fn as_structured(&self) -> Option<&serde_json::Value> {
    match self {
      Value::Structured(v) => Some(v),
      Value::Text(_) => None,
    }
  }
}

/// Decode a host-store string.
///
/// Strings that parse as a JSON object, array or null come back
/// `Structured`; anything else stays `Text`.
pub fn resolve(raw: &str) -> Value {
  match serde_json::from_str::<serde_json::Value>(raw) {
    Ok(v @ (serde_json::Value::Object(_) | serde_json::Value::Array(_) | serde_json::Value::Null)) => {
      Value::Structured(v)
    }
    _ => Value::Text(raw.to_string()),
  }
}

/// JSON kind name, used in error reports
pub fn json_kind(value: &serde_json::Value) -> &'static str {
  match value {
    serde_json::Value::Null => "null",
    serde_json::Value::Bool(_) => "boolean",
    serde_json::Value::Number(_) => "number",
    serde_json::Value::String(_) => "string",
    serde_json::Value::Array(_) => "array",
    serde_json::Value::Object(_) => "object",
  }
}

impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Text(s)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Text(s.to_string())
  }
}

impl From<serde_json::Map<String, serde_json::Value>> for Value {
  fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
    Value::Structured(serde_json::Value::Object(map))
  }
}

impl From<Vec<serde_json::Value>> for Value {
  fn from(items: Vec<serde_json::Value>) -> Self {
    Value::Structured(serde_json::Value::Array(items))
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.encode())
  }
}
