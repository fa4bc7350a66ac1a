use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{LocalsError, Result};

/// Synchronous string key-value store the mirror writes through to.
///
/// Methods take `&self`: implementations own their interior mutability so
/// the same store can be shared with code that writes to it directly.
pub trait HostStore {
  /// Read the stored string for a key
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Store a string under a key, replacing any previous value
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Remove a key; removing an absent key is not an error
  fn remove_item(&self, key: &str) -> Result<()>;

  /// Every key currently held
  fn keys(&self) -> Result<Vec<String>>;
}

impl<T: HostStore + ?Sized> HostStore for &T {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    (**self).get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    (**self).set_item(key, value)
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    (**self).remove_item(key)
  }

  fn keys(&self) -> Result<Vec<String>> {
    (**self).keys()
  }
}

impl<T: HostStore + ?Sized> HostStore for Arc<T> {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    (**self).get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    (**self).set_item(key, value)
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    (**self).remove_item(key)
  }

  fn keys(&self) -> Result<Vec<String>> {
    (**self).keys()
  }
}

/// In-memory host store
#[derive(Debug)]
pub struct MemoryStore {
  data: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
  /// Create a new empty store
  pub fn new() -> Self {
    Self {
      data: RwLock::new(BTreeMap::new()),
    }
  }

  /// Number of stored entries
  pub fn len(&self) -> Result<usize> {
    let data = self.data.read().map_err(|_| poisoned())?;
    Ok(data.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

fn poisoned() -> LocalsError {
  LocalsError::Host("lock poisoned".to_string())
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V> FromIterator<(K, V)> for MemoryStore
where
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      data: RwLock::new(
        iter
          .into_iter()
          .map(|(k, v)| (k.into(), v.into()))
          .collect(),
      ),
    }
  }
}

impl HostStore for MemoryStore {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let data = self.data.read().map_err(|_| poisoned())?;
    Ok(data.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut data = self.data.write().map_err(|_| poisoned())?;
    data.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut data = self.data.write().map_err(|_| poisoned())?;
    data.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let data = self.data.read().map_err(|_| poisoned())?;
    Ok(data.keys().cloned().collect())
  }
}
