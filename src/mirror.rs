//! In-memory mirror over a host store
//!
//! [`KeyValueMirror`] copies every host entry into memory when it is opened,
//! writes through to the host on `set`/`remove`, and on every keyed read
//! checks that the host still holds what the mirror expects.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MirrorConfig;
use crate::encoding::{Value, resolve};
use crate::error::{LocalsError, Result};
use crate::host::HostStore;
use crate::util::time::now_ms;

/// Outcome of a multi-key read
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lookup {
  resolved: Vec<(String, Value)>,
  faults: Vec<String>,
}

/// Legacy return shape of a multi-key read
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
  /// Exactly one key resolved
  One(Value),
  /// Zero or several keys resolved, in request order
  Many(Vec<Value>),
}

impl Lookup {
  /// Resolved `(key, value)` pairs in request order
  pub fn resolved(&self) -> &[(String, Value)] {
    &self.resolved
  }

  /// Keys skipped because the host store disagreed with the mirror
  pub fn faults(&self) -> &[String] {
    &self.faults
  }

  pub fn values(&self) -> impl Iterator<Item = &Value> {
    self.resolved.iter().map(|(_, v)| v)
  }

  pub fn is_complete(&self) -> bool {
    self.faults.is_empty()
  }

  /// Collapse to a single value when exactly one key resolved
  pub fn into_resolved(self) -> Resolved {
    let mut values: Vec<Value> = self.resolved.into_iter().map(|(_, v)| v).collect();
    if values.len() == 1 {
      Resolved::One(values.remove(0))
    } else {
      Resolved::Many(values)
    }
  }
}

/// Typed key-value access with an in-memory mirror of the host store
#[derive(Debug)]
pub struct KeyValueMirror<H: HostStore> {
  host: H,
  store: BTreeMap<String, Value>,
  /// Keys copied from the host at open time and not rewritten since
  seeded: BTreeSet<String>,
  current_key: Option<String>,
  nick: Option<String>,
}

impl<H: HostStore> KeyValueMirror<H> {
  /// Open a mirror over `host`, copying all of its entries into memory.
  ///
  /// The nick is read once from `session` under `config.nick_key`.
  pub fn open<S: HostStore>(host: H, session: &S, config: &MirrorConfig) -> Result<Self> {
    let mut store = BTreeMap::new();
    let keys = host
      .keys()
      .inspect_err(|e| error!("open failed: cannot list host keys: {}", e))?;
    for key in keys {
      let raw = host
        .get_item(&key)
        .inspect_err(|e| error!(key = %key, "open failed: cannot read host entry: {}", e))?;
      if let Some(raw) = raw {
        store.insert(key, Value::Text(raw));
      }
    }
    let seeded = store.keys().cloned().collect();
    let nick = session
      .get_item(&config.nick_key)
      .inspect_err(|e| error!("open failed: cannot read nick: {}", e))?;

    info!(entries = store.len(), nick = ?nick, at = now_ms(), "opened mirror over host store");

    Ok(Self {
      host,
      store,
      seeded,
      current_key: None,
      nick,
    })
  }

  /// Write a value to the mirror and the host store
  pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<&mut Self> {
    let key = key.into();
    if key.is_empty() {
      error!("set rejected: empty key");
      return Err(LocalsError::InvalidKey);
    }
    let value = value.into();

    self
      .host
      .set_item(&key, &value.encode())
      .inspect_err(|e| error!(key = %key, "SET failed: {}", e))?;
    debug!(key = %key, value = %value, at = now_ms(), "SET");

    self.seeded.remove(&key);
    self.store.insert(key.clone(), value);
    self.current_key = Some(key);
    Ok(self)
  }

  /// Write an arbitrary JSON value; numbers and booleans are rejected
  pub fn set_json(&mut self, key: impl Into<String>, json: serde_json::Value) -> Result<&mut Self> {
    let key = key.into();
    let value = Value::from_json(&key, json).inspect_err(|e| error!("set rejected: {}", e))?;
    self.set(key, value)
  }

  /// Serialize `value` to JSON and write it like [`Self::set_json`]
  pub fn set_serialize<T: Serialize + ?Sized>(
    &mut self,
    key: impl Into<String>,
    value: &T,
  ) -> Result<&mut Self> {
    let json = serde_json::to_value(value)?;
    self.set_json(key, json)
  }

  /// Read one key, checking it against the host store.
  ///
  /// Text written through [`Self::set`] comes back verbatim even when it
  /// looks like JSON; only entries seeded from the host at open time are
  /// parsed.
  pub fn get(&self, key: &str) -> Result<Value> {
    if key.is_empty() || !self.store.contains_key(key) {
      error!(key = %key, "GET failed: key not found");
      return Err(LocalsError::key_not_found([key]));
    }
    self.check(key)?.ok_or_else(|| LocalsError::ConsistencyFault {
      key: key.to_string(),
    })
  }

  /// Read several keys in request order.
  ///
  /// Keys that fail the consistency check are logged and reported in
  /// [`Lookup::faults`]. With no keys this falls back to [`Self::current`].
  pub fn get_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<Lookup> {
    if keys.is_empty() {
      let key = self.current_key.clone().ok_or_else(|| {
        error!("GET failed: no key requested and none written yet");
        LocalsError::NoKey
      })?;
      let value = self.current()?.clone();
      return Ok(Lookup {
        resolved: vec![(key, value)],
        faults: Vec::new(),
      });
    }

    let present: Vec<&str> = keys
      .iter()
      .map(|k| k.as_ref())
      .filter(|k| !k.is_empty() && self.store.contains_key(*k))
      .collect();
    if present.is_empty() {
      let requested: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
      error!(keys = ?requested, "GET failed: key not found");
      return Err(LocalsError::key_not_found(requested));
    }

    let mut lookup = Lookup::default();
    for key in present {
      match self.check(key)? {
        Some(value) => lookup.resolved.push((key.to_string(), value)),
        None => lookup.faults.push(key.to_string()),
      }
    }
    debug!(resolved = lookup.resolved.len(), faults = ?lookup.faults, at = now_ms(), "GET");
    Ok(lookup)
  }

  /// Value at the last written key, without a consistency check
  pub fn current(&self) -> Result<&Value> {
    self
      .current_key
      .as_ref()
      .and_then(|k| self.store.get(k))
      .ok_or(LocalsError::NoKey)
  }

  pub fn current_key(&self) -> Option<&str> {
    self.current_key.as_deref()
  }

  /// The whole mirror, unchecked
  pub fn get_all(&self) -> &BTreeMap<String, Value> {
    debug!(entries = self.store.len(), at = now_ms(), "GET ALL");
    &self.store
  }

  /// Remove keys from the mirror and the host store.
  ///
  /// Absent keys are skipped; if none of `keys` is present nothing changes
  /// and `KeyNotFound` is returned. A key leaves the mirror only once the
  /// host removal succeeded; if any host removal fails, the remaining keys
  /// are still attempted and the first error is returned.
  pub fn remove<K: AsRef<str>>(&mut self, keys: &[K]) -> Result<&BTreeMap<String, Value>> {
    let present: Vec<String> = keys
      .iter()
      .map(|k| k.as_ref())
      .filter(|k| !k.is_empty() && self.store.contains_key(*k))
      .map(str::to_string)
      .collect();
    if present.is_empty() {
      let requested: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();
      error!(keys = ?requested, "REMOVE failed: key not found");
      return Err(LocalsError::key_not_found(requested));
    }

    let mut failure = None;
    for key in &present {
      if let Err(e) = self.host.remove_item(key) {
        error!(key = %key, "REMOVE failed: {}", e);
        if failure.is_none() {
          failure = Some(e);
        }
        continue;
      }
      self.store.remove(key);
      self.seeded.remove(key);
      if self.current_key.as_deref() == Some(key.as_str()) {
        self.current_key = None;
      }
    }
    if let Some(e) = failure {
      return Err(e);
    }
    debug!(keys = ?present, at = now_ms(), "REMOVE");
    Ok(&self.store)
  }

  /// Display nick captured from the session store at open time
  pub fn nick(&self) -> Option<&str> {
    self.nick.as_deref()
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.store.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.store.is_empty()
  }

  pub fn host(&self) -> &H {
    &self.host
  }

  /// Compare a present key with the host store; `None` on mismatch
  fn check(&self, key: &str) -> Result<Option<Value>> {
    let Some(value) = self.store.get(key) else {
      return Ok(None);
    };
    let expected = value.encode();
    let actual = self
      .host
      .get_item(key)
      .inspect_err(|e| error!(key = %key, "GET failed: {}", e))?;
    if actual.as_deref() != Some(&*expected) {
      warn!(key = %key, expected = %expected, actual = ?actual, "consistency fault: host store diverged from mirror");
      return Ok(None);
    }

    if self.seeded.contains(key) {
      Ok(Some(resolve(&expected)))
    } else {
      Ok(Some(value.clone()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::MemoryStore;
  use rand::Rng;
  use rand::distr::Alphanumeric;
  use serde_json::json;
  use std::sync::Arc;

  fn open_empty() -> KeyValueMirror<MemoryStore> {
    KeyValueMirror::open(MemoryStore::new(), &MemoryStore::new(), &MirrorConfig::default()).unwrap()
  }

  fn random_string(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric).take(len).map(char::from).collect()
  }

  #[test]
  fn test_open_seeds_mirror_as_text() {
    let host: MemoryStore = [("theme", "dark"), ("prefs", r#"{"lang":"en"}"#)]
      .into_iter()
      .collect();
    let session: MemoryStore = [("PY_ZHU_LOGINUSER_NICK", "guest")].into_iter().collect();
    let mirror = KeyValueMirror::open(host, &session, &MirrorConfig::default()).unwrap();

    assert_eq!(mirror.len(), 2);
    assert_eq!(mirror.get_all()["prefs"], Value::Text(r#"{"lang":"en"}"#.to_string()));
    assert_eq!(mirror.nick(), Some("guest"));
    assert_eq!(mirror.current_key(), None);
  }

  #[test]
  fn test_seeded_json_is_parsed_on_get() {
    let host: MemoryStore = [("prefs", r#"{"lang":"en"}"#), ("theme", "dark")]
      .into_iter()
      .collect();
    let mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();

    assert_eq!(mirror.get("prefs").unwrap(), Value::Structured(json!({"lang": "en"})));
    assert_eq!(mirror.get("theme").unwrap(), Value::from("dark"));
  }

  #[test]
  fn test_set_then_get_random_strings() {
    let mut rng = rand::rng();
    let mut mirror = open_empty();
    for _ in 0..100 {
      let len = rng.random_range(1..16);
      let key = random_string(&mut rng, len);
      let len = rng.random_range(0..64);
      let value = random_string(&mut rng, len);
      mirror.set(key.as_str(), value.as_str()).unwrap();
      assert_eq!(mirror.get(&key).unwrap(), Value::Text(value));
    }
  }

  #[test]
  fn test_text_that_looks_like_json_stays_text() {
    let mut mirror = open_empty();
    mirror.set("raw", "[1,2,3]").unwrap();
    assert_eq!(mirror.get("raw").unwrap(), Value::from("[1,2,3]"));
    assert_eq!(mirror.host().get_item("raw").unwrap(), Some("[1,2,3]".to_string()));
  }

  #[test]
  fn test_set_then_get_structured() {
    let mut mirror = open_empty();
    let object = json!({"y": 1, "nested": {"list": [true, null, "s"]}});
    mirror.set_json("obj", object.clone()).unwrap();

    assert_eq!(mirror.get("obj").unwrap(), Value::Structured(object.clone()));
    assert_eq!(mirror.host().get_item("obj").unwrap(), Some(object.to_string()));
  }

  #[test]
  fn test_set_serialize() {
    #[derive(Serialize)]
    struct Prefs {
      lang: &'static str,
      size: u8,
    }

    let mut mirror = open_empty();
    mirror.set_serialize("prefs", &Prefs { lang: "en", size: 12 }).unwrap();
    assert_eq!(
      mirror.get("prefs").unwrap(),
      Value::Structured(json!({"lang": "en", "size": 12}))
    );

    let err = mirror.set_serialize("n", &7u32).unwrap_err();
    assert!(matches!(err, LocalsError::UnsupportedValueType { kind: "number", .. }));
  }

  #[test]
  fn test_unsupported_value_does_not_mutate() {
    let mut mirror = open_empty();
    let err = mirror.set_json("a", json!(42)).unwrap_err();
    assert!(matches!(err, LocalsError::UnsupportedValueType { .. }));

    assert!(mirror.get_all().is_empty());
    assert!(mirror.host().is_empty().unwrap());
    assert_eq!(mirror.current_key(), None);
    assert!(matches!(mirror.get("a"), Err(LocalsError::KeyNotFound { .. })));
  }

  #[test]
  fn test_empty_key_rejected() {
    let mut mirror = open_empty();
    assert!(matches!(mirror.set("", "x"), Err(LocalsError::InvalidKey)));
    assert!(mirror.is_empty());
  }

  #[test]
  fn test_set_is_chainable() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap().set("b", "y").unwrap();
    assert_eq!(mirror.len(), 2);
    assert_eq!(mirror.current_key(), Some("b"));
  }

  #[test]
  fn test_get_without_keys_before_set() {
    let mirror = open_empty();
    let keys: [&str; 0] = [];
    assert!(matches!(mirror.get_many(&keys), Err(LocalsError::NoKey)));
    assert!(matches!(mirror.current(), Err(LocalsError::NoKey)));
  }

  #[test]
  fn test_get_without_keys_uses_last_written() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();
    mirror.set_json("b", json!({"y": 1})).unwrap();

    let keys: [&str; 0] = [];
    let lookup = mirror.get_many(&keys).unwrap();
    assert_eq!(lookup.into_resolved(), Resolved::One(Value::Structured(json!({"y": 1}))));
  }

  #[test]
  fn test_get_many_preserves_request_order() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();
    mirror.set_json("b", json!({"y": 1})).unwrap();

    let lookup = mirror.get_many(&["b", "a"]).unwrap();
    assert!(lookup.is_complete());
    assert_eq!(
      lookup.values().cloned().collect::<Vec<_>>(),
      vec![Value::Structured(json!({"y": 1})), Value::from("x")]
    );

    let resolved = mirror.get_many(&["a", "b"]).unwrap().into_resolved();
    assert_eq!(
      resolved,
      Resolved::Many(vec![Value::from("x"), Value::Structured(json!({"y": 1}))])
    );
  }

  #[test]
  fn test_get_many_skips_missing_keys() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();

    let lookup = mirror.get_many(&["missing", "a", ""]).unwrap();
    assert_eq!(lookup.into_resolved(), Resolved::One(Value::from("x")));
  }

  #[test]
  fn test_get_many_none_present() {
    let mirror = open_empty();
    match mirror.get_many(&["x", "y"]) {
      Err(LocalsError::KeyNotFound { keys }) => assert_eq!(keys, vec!["x", "y"]),
      other => panic!("Expected key not found, got {:?}", other),
    }
  }

  #[test]
  fn test_consistency_fault_is_reported() {
    let host = Arc::new(MemoryStore::new());
    let mut mirror =
      KeyValueMirror::open(Arc::clone(&host), &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    mirror.set("a", "x").unwrap();
    mirror.set("b", "y").unwrap();

    // out-of-band write
    host.set_item("a", "tampered").unwrap();

    assert!(matches!(
      mirror.get("a"),
      Err(LocalsError::ConsistencyFault { ref key }) if key == "a"
    ));

    let lookup = mirror.get_many(&["a", "b"]).unwrap();
    assert_eq!(lookup.faults(), ["a".to_string()]);
    assert_eq!(lookup.into_resolved(), Resolved::One(Value::from("y")));

    // not corrected
    assert_eq!(host.get_item("a").unwrap(), Some("tampered".to_string()));
  }

  #[test]
  fn test_out_of_band_removal_is_a_fault() {
    let host = Arc::new(MemoryStore::new());
    let mut mirror =
      KeyValueMirror::open(Arc::clone(&host), &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    mirror.set("a", "x").unwrap();
    host.remove_item("a").unwrap();

    let lookup = mirror.get_many(&["a"]).unwrap();
    assert_eq!(lookup.into_resolved(), Resolved::Many(vec![]));
  }

  #[test]
  fn test_remove_existing() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap().set("b", "y").unwrap();

    let remaining = mirror.remove(&["a"]).unwrap();
    assert!(!remaining.contains_key("a"));
    assert!(remaining.contains_key("b"));
    assert_eq!(mirror.host().get_item("a").unwrap(), None);
    assert_eq!(mirror.current_key(), Some("b"));
  }

  #[test]
  fn test_remove_missing_leaves_state() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();

    let before = mirror.get_all().clone();
    assert!(matches!(mirror.remove(&["missing"]), Err(LocalsError::KeyNotFound { .. })));
    assert_eq!(mirror.get_all(), &before);
    assert_eq!(mirror.host().get_item("a").unwrap(), Some("x".to_string()));
  }

  #[test]
  fn test_remove_current_key_clears_pointer() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();
    mirror.remove(&["a", "missing"]).unwrap();

    assert_eq!(mirror.current_key(), None);
    let keys: [&str; 0] = [];
    assert!(matches!(mirror.get_many(&keys), Err(LocalsError::NoKey)));
  }

  #[test]
  fn test_get_all_is_idempotent() {
    let host: MemoryStore = [("seed", "1")].into_iter().collect();
    let mut mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    mirror.set_json("obj", json!([1, 2])).unwrap();

    let first = mirror.get_all().clone();
    let second = mirror.get_all().clone();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
  }

  /// Host store whose removals fail for one key
  struct FailingRemove {
    inner: MemoryStore,
    broken: &'static str,
  }

  impl HostStore for FailingRemove {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
      self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
      self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
      if key == self.broken {
        return Err(LocalsError::Host(format!("cannot remove '{}'", key)));
      }
      self.inner.remove_item(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
      self.inner.keys()
    }
  }

  #[test]
  fn test_remove_host_failure_keeps_mirror_consistent() {
    let host = FailingRemove {
      inner: [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect(),
      broken: "b",
    };
    let mut mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();

    let err = mirror.remove(&["a", "b", "c"]).unwrap_err();
    assert!(matches!(err, LocalsError::Host(_)));

    // removed on both sides, or kept on both sides
    assert!(!mirror.contains_key("a"));
    assert!(!mirror.contains_key("c"));
    assert_eq!(mirror.get("b").unwrap(), Value::from("2"));
    assert_eq!(mirror.host().get_item("a").unwrap(), None);
    assert_eq!(mirror.host().get_item("c").unwrap(), None);
  }

  #[test]
  fn test_host_failure_is_logged() {
    let path = std::env::temp_dir().join(format!("locals_mirror_{}.log", std::process::id()));
    let file = std::fs::File::create(&path).unwrap();
    let subscriber = tracing_subscriber::fmt()
      .with_ansi(false)
      .with_writer(std::sync::Mutex::new(file))
      .finish();

    let host = FailingRemove {
      inner: [("b", "2")].into_iter().collect(),
      broken: "b",
    };
    let mut mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    tracing::subscriber::with_default(subscriber, || {
      assert!(mirror.remove(&["b"]).is_err());
    });

    let written = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert!(written.contains("REMOVE failed"));
    assert!(written.contains("cannot remove 'b'"));
  }

  #[test]
  fn test_text_and_seeded_json_resolve_differently() {
    let host: MemoryStore = [("seeded", r#"{"a":1}"#)].into_iter().collect();
    let mut mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    mirror.set("written", r#"{"a":1}"#).unwrap();

    assert_eq!(mirror.get("seeded").unwrap(), Value::Structured(json!({"a": 1})));
    assert_eq!(mirror.get("written").unwrap(), Value::from(r#"{"a":1}"#));
  }

  #[test]
  fn test_mirror_is_debug() {
    let mut mirror = open_empty();
    mirror.set("a", "x").unwrap();
    let rendered = format!("{:?}", mirror);
    assert!(rendered.contains("KeyValueMirror"));
    assert!(rendered.contains("current_key: Some(\"a\")"));
  }

  #[test]
  fn test_overwriting_seeded_entry_keeps_native_type() {
    let host: MemoryStore = [("raw", "[1]")].into_iter().collect();
    let mut mirror = KeyValueMirror::open(host, &MemoryStore::new(), &MirrorConfig::default()).unwrap();
    assert_eq!(mirror.get("raw").unwrap(), Value::Structured(json!([1])));

    mirror.set("raw", "[2]").unwrap();
    assert_eq!(mirror.get("raw").unwrap(), Value::from("[2]"));
  }
}
