//! Typed key-value access over a host string store, with an in-memory mirror
//!
//! ```
//! use locals::{KeyValueMirror, MemoryStore, MirrorConfig, Value};
//!
//! let mut mirror = KeyValueMirror::open(MemoryStore::new(), &MemoryStore::new(), &MirrorConfig::default())?;
//! mirror.set("a", "x")?.set_json("b", serde_json::json!({"y": 1}))?;
//! assert_eq!(mirror.get("a")?, Value::from("x"));
//! # Ok::<(), locals::LocalsError>(())
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod host;
pub mod logging;
pub mod mirror;
pub mod shell;
pub mod util;

pub use config::{Config, MirrorConfig};
pub use encoding::Value;
pub use error::{LocalsError, Result};
pub use host::{HostStore, MemoryStore};
pub use mirror::{KeyValueMirror, Lookup, Resolved};
