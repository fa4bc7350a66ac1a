use std::collections::BTreeMap;
use std::fmt::Write;

use crate::encoding::Value;

/// Shell answer to one command
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
  /// Command succeeded with nothing to show
  Ok,
  /// Absent value
  Nil,
  /// Errors
  Error(String),
  /// A single mirror value
  Value(Value),
  /// Several values, numbered in order
  Array(Vec<Value>),
  /// Key/value listing
  Map(Vec<(String, Value)>),
}

impl Reply {
  /// Create an error reply
  pub fn error(msg: impl std::fmt::Display) -> Self {
    Reply::Error(format!("ERR {}", msg))
  }

  pub fn map(entries: &BTreeMap<String, Value>) -> Self {
    Reply::Map(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
  }

  /// Encode the reply as newline-terminated text
  pub fn encode(&self) -> String {
    let mut buf = String::new();
    self.encode_to(&mut buf);
    buf
  }

  fn encode_to(&self, buf: &mut String) {
    match self {
      Reply::Ok => buf.push_str("OK\n"),
      Reply::Nil => buf.push_str("(nil)\n"),
      Reply::Error(e) => {
        buf.push_str(e);
        buf.push('\n');
      }
      Reply::Value(v) => {
        push_value(buf, v);
        buf.push('\n');
      }
      Reply::Array(items) if items.is_empty() => buf.push_str("(empty array)\n"),
      Reply::Array(items) => {
        for (i, item) in items.iter().enumerate() {
          let _ = write!(buf, "{}) ", i + 1);
          push_value(buf, item);
          buf.push('\n');
        }
      }
      Reply::Map(entries) if entries.is_empty() => buf.push_str("(empty)\n"),
      Reply::Map(entries) => {
        for (key, value) in entries {
          let _ = write!(buf, "{} => ", key);
          push_value(buf, value);
          buf.push('\n');
        }
      }
    }
  }
}

// Text is quoted so it can be told apart from JSON output.
fn push_value(buf: &mut String, value: &Value) {
  match value {
    Value::Text(s) => {
      let _ = write!(buf, "{:?}", s);
    }
    Value::Structured(v) => {
      let _ = write!(buf, "{}", v);
    }
  }
}
