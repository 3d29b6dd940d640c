//! Group records sharing a request/trace/correlation/transaction id.

use std::collections::VecDeque;

use crate::group::{GroupPolicy, OpenGroup};
use crate::keys;
use crate::recency::RecencyMap;
use crate::types::{CloseReason, Emission, Entry, StrategyKind};

/// Open groups keyed by identifier, evicted least-recently-updated first.
#[derive(Debug)]
pub struct IdentifierStrategy {
  capacity: usize,
  policy: GroupPolicy,
  open: RecencyMap<OpenGroup>,
  evicted: usize,
}

impl IdentifierStrategy {
  pub fn new(capacity: usize, policy: GroupPolicy) -> Self {
    Self {
      capacity: capacity.max(1),
      policy,
      open: RecencyMap::new(),
      evicted: 0,
    }
  }

  pub fn open_groups(&self) -> usize {
    self.open.len()
  }

  pub fn evicted(&self) -> usize {
    self.evicted
  }

  pub fn observe(&mut self, entry: &Entry, out: &mut VecDeque<Emission>) {
    let Some(key) = keys::identifier_key(&entry.record) else {
      out.push_back(Emission::Orphan {
        kind: StrategyKind::Identifier,
        entry: entry.clone(),
      });
      return;
    };

    if let Some(group) = self.open.touch(&key) {
      group.push(entry.clone());
      return;
    }

    if self.open.len() >= self.capacity {
      if let Some((lru_key, lru)) = self.open.pop_lru() {
        tracing::debug!(key = %lru_key, members = lru.len(), "identifier group evicted at capacity");
        self.evicted += 1;
        lru.close(CloseReason::Evicted, self.policy, out);
      }
    }
    let group = OpenGroup::new(StrategyKind::Identifier, key.clone(), entry.clone());
    self.open.insert(key, group);
  }

  pub fn finish(&mut self, out: &mut VecDeque<Emission>) {
    for (_, group) in self.open.drain_lru() {
      group.close(CloseReason::Flushed, self.policy, out);
    }
  }
}
