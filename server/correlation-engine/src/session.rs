//! Group records by session or user, splitting on inactivity.

use std::collections::VecDeque;

use chrono::Duration;

use crate::group::{GroupPolicy, OpenGroup};
use crate::keys;
use crate::recency::RecencyMap;
use crate::types::{CloseReason, Emission, Entry, StrategyKind};

/// One open session per key. A gap longer than the timeout closes the session
/// and starts a new group under the same key; closed groups are never reused.
#[derive(Debug)]
pub struct SessionStrategy {
  timeout: Duration,
  capacity: usize,
  policy: GroupPolicy,
  open: RecencyMap<OpenGroup>,
  evicted: usize,
}

impl SessionStrategy {
  pub fn new(timeout: Duration, capacity: usize, policy: GroupPolicy) -> Self {
    Self {
      timeout,
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
    let Some(key) = keys::session_key(&entry.record) else {
      out.push_back(Emission::Orphan {
        kind: StrategyKind::Session,
        entry: entry.clone(),
      });
      return;
    };

    if let Some(session) = self.open.touch(&key) {
      let expired = match (entry.timestamp(), session.last_seen()) {
        (Some(ts), Some(last)) => ts - last > self.timeout,
        _ => false,
      };
      if expired {
        let fresh = OpenGroup::new(StrategyKind::Session, key.clone(), entry.clone());
        let previous = std::mem::replace(session, fresh);
        tracing::debug!(key = %key, members = previous.len(), "session timed out");
        previous.close(CloseReason::TimedOut, self.policy, out);
      } else {
        session.push(entry.clone());
      }
      return;
    }

    if self.open.len() >= self.capacity {
      if let Some((lru_key, lru)) = self.open.pop_lru() {
        tracing::debug!(key = %lru_key, members = lru.len(), "session evicted at capacity");
        self.evicted += 1;
        lru.close(CloseReason::Evicted, self.policy, out);
      }
    }
    let session = OpenGroup::new(StrategyKind::Session, key.clone(), entry.clone());
    self.open.insert(key, session);
  }

  pub fn finish(&mut self, out: &mut VecDeque<Emission>) {
    for (_, session) in self.open.drain_lru() {
      session.close(CloseReason::Flushed, self.policy, out);
    }
  }
}
