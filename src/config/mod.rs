use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

use crate::host::MemoryStore;

/// Log configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogConfig {
  /// Log file path, if not set, logs will be printed to stderr
  pub file: Option<String>,
  /// Log level, default is "info"
  #[serde(default = "default_log_level")]
  pub level: String,
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      file: None,
      level: default_log_level(),
    }
  }
}

/// Mirror construction options
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MirrorConfig {
  /// Session-store key holding the display nick
  #[serde(default = "default_nick_key")]
  pub nick_key: String,
}

fn default_nick_key() -> String {
  "PY_ZHU_LOGINUSER_NICK".to_string()
}

impl Default for MirrorConfig {
  fn default() -> Self {
    Self {
      nick_key: default_nick_key(),
    }
  }
}

/// Initial contents of an in-memory store
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StoreConfig {
  #[serde(default)]
  pub entries: BTreeMap<String, String>,
}

impl StoreConfig {
  pub fn build(&self) -> MemoryStore {
    self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
  }
}

/// Shell configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
  #[serde(default)]
  pub mirror: MirrorConfig,

  /// Host store seed
  #[serde(default)]
  pub host: StoreConfig,

  /// Session store seed
  #[serde(default)]
  pub session: StoreConfig,

  /// Log configuration
  #[serde(default)]
  pub log: LogConfig,
}

impl Config {
  /// Load configuration from TOML file
  pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
    let config_str = fs::read_to_string(path)
      .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

    let config: Config = toml::from_str(&config_str)
      .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?;

    if config.mirror.nick_key.is_empty() {
      return Err("mirror.nick_key must not be empty".into());
    }

    Ok(config)
  }
}
