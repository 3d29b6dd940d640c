//! Run statistics, accumulated incrementally as emissions stream past.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::types::{Emission, Statistics, StrategyKind, StrategyStats};

/// Running counters for one correlation run.
#[derive(Debug, Default)]
pub struct Tally {
  groups: usize,
  memberships: usize,
  correlated: HashSet<u64>,
  origins: BTreeSet<String>,
  per_strategy: BTreeMap<StrategyKind, StrategyStats>,
}

impl Tally {
  /// Every requested strategy gets a row, even if it never emits.
  pub fn new(kinds: &[StrategyKind]) -> Self {
    Self {
      per_strategy: kinds.iter().map(|&k| (k, StrategyStats::default())).collect(),
      ..Self::default()
    }
  }

  pub fn record(&mut self, emission: &Emission) {
    match emission {
      Emission::Group(group) => {
        self.groups += 1;
        self.memberships += group.len();
        self.correlated.extend(group.members.iter().map(|m| m.seq));
        self.origins.extend(group.sources.iter().cloned());
        let row = self.per_strategy.entry(group.kind).or_default();
        row.groups += 1;
        row.grouped_entries += group.len();
      }
      Emission::Orphan { kind, .. } => {
        self.per_strategy.entry(*kind).or_default().orphans += 1;
      }
    }
  }

  pub fn set_evicted(&mut self, kind: StrategyKind, evicted: usize) {
    self.per_strategy.entry(kind).or_default().evicted_groups = evicted;
  }

  /// Close the tally over a merged stream of `total_entries` records.
  pub fn finish(self, total_entries: u64) -> Statistics {
    let correlated_entries = self.correlated.len() as u64;
    let correlation_rate = if total_entries == 0 {
      0.0
    } else {
      correlated_entries as f64 / total_entries as f64
    };
    // Mean members per group; a record grouped by two strategies counts twice.
    let avg_group_size = if self.groups == 0 {
      0.0
    } else {
      self.memberships as f64 / self.groups as f64
    };

    Statistics {
      total_groups: self.groups,
      total_entries,
      correlated_entries,
      orphan_entries: total_entries.saturating_sub(correlated_entries),
      correlation_rate,
      sources_covered: self.origins.len(),
      avg_group_size,
      per_strategy: self.per_strategy,
    }
  }
}
