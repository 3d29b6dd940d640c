//! Key → value map ordered by recency of update (least recently updated first).

use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct RecencyMap<V> {
  entries: HashMap<String, (u64, V)>,
  order: BTreeMap<u64, String>,
  tick: u64,
}

impl<V> Default for RecencyMap<V> {
  fn default() -> Self {
    Self {
      entries: HashMap::new(),
      order: BTreeMap::new(),
      tick: 0,
    }
  }
}

impl<V> RecencyMap<V> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Mark `key` as most recently updated and return its value.
  pub fn touch(&mut self, key: &str) -> Option<&mut V> {
    let (tick, value) = self.entries.get_mut(key)?;
    self.order.remove(&*tick);
    self.tick += 1;
    *tick = self.tick;
    self.order.insert(self.tick, key.to_string());
    Some(value)
  }

  /// Insert as most recently updated. Replaces any existing value for `key`.
  pub fn insert(&mut self, key: String, value: V) {
    self.tick += 1;
    if let Some((old_tick, _)) = self.entries.insert(key.clone(), (self.tick, value)) {
      self.order.remove(&old_tick);
    }
    self.order.insert(self.tick, key);
  }

  /// Remove and return the least recently updated entry.
  pub fn pop_lru(&mut self) -> Option<(String, V)> {
    let (_, key) = self.order.pop_first()?;
    let (_, value) = self.entries.remove(&key)?;
    Some((key, value))
  }

  /// Remove everything, least recently updated first.
  pub fn drain_lru(&mut self) -> Vec<(String, V)> {
    let mut drained = Vec::with_capacity(self.entries.len());
    while let Some(pair) = self.pop_lru() {
      drained.push(pair);
    }
    drained
  }
}
