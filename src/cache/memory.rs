//! Process-lifetime memory maps that shadow the persistent store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A string-keyed in-memory map. Values are cloned out on read.
///
/// Concurrent writers to the same key race; the last insert wins.
#[derive(Debug)]
pub struct MemoryMap<T> {
  entries: RwLock<HashMap<String, T>>,
}

impl<T> Default for MemoryMap<T> {
  fn default() -> Self {
    Self {
      entries: RwLock::new(HashMap::new()),
    }
  }
}

impl<T: Clone> MemoryMap<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, key: &str) -> Option<T> {
    self.read().get(key).cloned()
  }

  pub fn insert(&self, key: &str, value: T) {
    self.write().insert(key.to_string(), value);
  }

  pub fn clear(&self) {
    self.write().clear();
  }

  // A panic while holding the lock leaves the map itself intact, so
  // poisoning is ignored.
  fn read(&self) -> RwLockReadGuard<'_, HashMap<String, T>> {
    self.entries.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, T>> {
    self.entries.write().unwrap_or_else(|e| e.into_inner())
  }
}
