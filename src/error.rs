//! Error types for mirror operations

use thiserror::Error;

/// Errors raised by the mirror and the host stores it wraps
#[derive(Error, Debug)]
pub enum LocalsError {
  /// `set` was offered a value that is neither text nor a JSON structure
  #[error("unsupported value type '{kind}' for key '{key}'")]
  UnsupportedValueType {
    /// Key the caller tried to write
    key: String,
    /// JSON kind of the rejected value
    kind: &'static str,
  },

  /// Mirror and host store disagree on the serialized value of a key
  #[error("consistency fault for key '{key}': mirror and host store disagree")]
  ConsistencyFault { key: String },

  /// Key-less read before anything was written
  #[error("no key has been written yet")]
  NoKey,

  /// None of the requested keys exist in the mirror
  #[error("key not found: {}", .keys.join(", "))]
  KeyNotFound { keys: Vec<String> },

  /// Empty keys cannot be written
  #[error("invalid key: keys must be non-empty")]
  InvalidKey,

  /// Host store failure (lock poisoning and the like)
  #[error("host store error: {0}")]
  Host(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl LocalsError {
  pub fn key_not_found<I, S>(keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self::KeyNotFound {
      keys: keys.into_iter().map(Into::into).collect(),
    }
  }
}

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, LocalsError>;
