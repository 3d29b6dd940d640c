//! Group records by temporal proximity.
//!
//! A record joins the active group whose last record is closest in time, as
//! long as the gap is within the window. Groups are indexed by creation order
//! (eviction) and by `last_seen` (candidate lookup), so a join is a range scan
//! over nearby groups instead of a pass over every active group.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::group::{GroupPolicy, OpenGroup};
use crate::keys;
use crate::types::{CloseReason, Emission, Entry, StrategyKind};

#[derive(Debug)]
struct Active {
  group: OpenGroup,
  last_seen: DateTime<Utc>,
}

#[derive(Debug)]
pub struct WindowStrategy {
  window: Duration,
  capacity: usize,
  policy: GroupPolicy,
  /// Keyed by creation number: first entry is the oldest-created group.
  active: BTreeMap<u64, Active>,
  by_last_seen: BTreeSet<(DateTime<Utc>, u64)>,
  created: u64,
  evicted: usize,
}

impl WindowStrategy {
  pub fn new(window: Duration, capacity: usize, policy: GroupPolicy) -> Self {
    Self {
      window,
      capacity: capacity.max(1),
      policy,
      active: BTreeMap::new(),
      by_last_seen: BTreeSet::new(),
      created: 0,
      evicted: 0,
    }
  }

  pub fn open_groups(&self) -> usize {
    self.active.len()
  }

  pub fn evicted(&self) -> usize {
    self.evicted
  }

  pub fn observe(&mut self, entry: &Entry, out: &mut VecDeque<Emission>) {
    let Some(ts) = entry.timestamp() else {
      out.push_back(Emission::Orphan {
        kind: StrategyKind::TimeWindow,
        entry: entry.clone(),
      });
      return;
    };

    match self.closest(ts) {
      Some(id) => self.join(id, ts, entry),
      None => self.open(ts, entry, out),
    }
  }

  pub fn finish(&mut self, out: &mut VecDeque<Emission>) {
    self.by_last_seen.clear();
    for (_, active) in std::mem::take(&mut self.active) {
      active.group.close(CloseReason::Flushed, self.policy, out);
    }
  }

  /// Active group with the smallest gap to `ts` within the window; ties go to
  /// the earliest-created group.
  fn closest(&self, ts: DateTime<Utc>) -> Option<u64> {
    let lo = ts.checked_sub_signed(self.window).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let hi = ts.checked_add_signed(self.window).unwrap_or(DateTime::<Utc>::MAX_UTC);
    self
      .by_last_seen
      .range((lo, 0)..=(hi, u64::MAX))
      .map(|&(last_seen, id)| (gap(ts, last_seen), id))
      .min()
      .map(|(_, id)| id)
  }

  /// Add `entry` to group `id`. `last_seen` only moves forward: a record older
  /// than the group's latest one joins without pulling the group back in time.
  fn join(&mut self, id: u64, ts: DateTime<Utc>, entry: &Entry) {
    let Some(active) = self.active.get_mut(&id) else {
      return;
    };
    self.by_last_seen.remove(&(active.last_seen, id));
    active.last_seen = active.last_seen.max(ts);
    active.group.push(entry.clone());
    self.by_last_seen.insert((active.last_seen, id));
  }

  fn open(&mut self, ts: DateTime<Utc>, entry: &Entry, out: &mut VecDeque<Emission>) {
    if self.active.len() >= self.capacity {
      self.evict_one(ts, out);
    }
    let id = self.created;
    self.created += 1;
    let group = OpenGroup::new(StrategyKind::TimeWindow, keys::window_key(&ts), entry.clone());
    self.active.insert(id, Active { group, last_seen: ts });
    self.by_last_seen.insert((ts, id));
  }

  /// Evict the oldest-created group idle for longer than the window relative
  /// to `now`; if every group is still live, the oldest-created one goes.
  ///
  /// Idle groups are read off the `last_seen` index, so the scan covers only
  /// groups last seen before `now - window`.
  fn evict_one(&mut self, now: DateTime<Utc>, out: &mut VecDeque<Emission>) {
    let idle = now.checked_sub_signed(self.window).and_then(|cutoff| {
      self
        .by_last_seen
        .range(..(cutoff, 0))
        .map(|&(_, id)| id)
        .min()
    });
    let victim = idle.or_else(|| self.active.keys().next().copied());
    let Some(id) = victim else {
      return;
    };
    if let Some(active) = self.active.remove(&id) {
      self.by_last_seen.remove(&(active.last_seen, id));
      tracing::debug!(
        key = active.group.key(),
        members = active.group.len(),
        "time window group evicted at capacity"
      );
      self.evicted += 1;
      active.group.close(CloseReason::Evicted, self.policy, out);
    }
  }
}

fn gap(a: DateTime<Utc>, b: DateTime<Utc>) -> Duration {
  if a >= b {
    a - b
  } else {
    b - a
  }
}
