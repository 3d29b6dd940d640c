//! Open-group accumulator and the rules for closing it.

use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::keys;
use crate::types::{CloseReason, Emission, Entry, Group, StrategyKind, TimeRange};

/// Which closing groups are reported as groups rather than released as orphans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPolicy {
  pub min_group_size: usize,
  pub require_multiple_sources: bool,
}

impl GroupPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      min_group_size: config.min_group_size,
      require_multiple_sources: config.require_multiple_sources,
    }
  }
}

impl Default for GroupPolicy {
  fn default() -> Self {
    Self {
      min_group_size: 1,
      require_multiple_sources: false,
    }
  }
}

/// A group still accepting records. Owned by exactly one strategy instance.
#[derive(Debug)]
pub struct OpenGroup {
  kind: StrategyKind,
  key: String,
  members: Vec<Entry>,
  sources: BTreeSet<Arc<str>>,
  first_seen: Option<DateTime<Utc>>,
  last_seen: Option<DateTime<Utc>>,
}

impl OpenGroup {
  pub fn new(kind: StrategyKind, key: String, first: Entry) -> Self {
    let mut group = Self {
      kind,
      key,
      members: Vec::new(),
      sources: BTreeSet::new(),
      first_seen: None,
      last_seen: None,
    };
    group.push(first);
    group
  }

  /// Append a record. `first_seen`/`last_seen` never move inward.
  pub fn push(&mut self, entry: Entry) {
    if let Some(ts) = entry.timestamp() {
      self.first_seen = Some(self.first_seen.map_or(ts, |f| f.min(ts)));
      self.last_seen = Some(self.last_seen.map_or(ts, |l| l.max(ts)));
    }
    self.sources.insert(Arc::clone(&entry.origin));
    self.members.push(entry);
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn last_seen(&self) -> Option<DateTime<Utc>> {
    self.last_seen
  }

  /// Finish the group. Emits one Group, or one Orphan per member when the
  /// policy rejects it, so no record is ever dropped.
  pub fn close(self, reason: CloseReason, policy: GroupPolicy, out: &mut VecDeque<Emission>) {
    let undersized = self.members.len() < policy.min_group_size;
    let single_source = policy.require_multiple_sources && self.sources.len() < 2;
    if undersized || single_source {
      let kind = self.kind;
      out.extend(self.members.into_iter().map(|entry| Emission::Orphan { kind, entry }));
      return;
    }

    let id = keys::group_id(self.kind, &self.key, self.members[0].seq);
    let mut members = self.members;
    members.sort_by(timeline_order);

    let time_range = match (self.first_seen, self.last_seen) {
      (Some(start), Some(end)) => Some(TimeRange { start, end }),
      _ => None,
    };

    out.push_back(Emission::Group(Group {
      id,
      key: self.key,
      kind: self.kind,
      close_reason: reason,
      sources: self.sources.iter().map(|s| s.to_string()).collect(),
      time_range,
      members,
    }));
  }
}

/// Timestamp ascending with untimestamped entries last; ties by arrival.
fn timeline_order(a: &Entry, b: &Entry) -> Ordering {
  let by_time = match (a.timestamp(), b.timestamp()) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  };
  by_time.then(a.seq.cmp(&b.seq))
}
