//! Tee the merged stream into several strategies and union their output.
//!
//! Every merged record is handed to each strategy before the next one is
//! pulled, so the tee buffers a single record and sources are read once.
//! Strategies share only the immutable `Arc<Record>`; each owns its groups.

use std::collections::VecDeque;

use crate::merge::Merger;
use crate::strategy::Strategy;
use crate::types::{Emission, StrategyKind};

/// Lazy sequence of emissions from all requested strategies.
///
/// Dropping it mid-way is cancellation: groups still open are discarded
/// without ever having been surfaced.
pub struct Correlated<'a> {
  merger: Merger<'a>,
  strategies: Vec<Strategy>,
  pending: VecDeque<Emission>,
  records_seen: u64,
  finished: bool,
}

impl<'a> Correlated<'a> {
  pub fn new(merger: Merger<'a>, strategies: Vec<Strategy>) -> Self {
    Self {
      merger,
      strategies,
      pending: VecDeque::new(),
      records_seen: 0,
      finished: false,
    }
  }

  /// Records pulled from the merged stream so far.
  pub fn records_seen(&self) -> u64 {
    self.records_seen
  }

  pub fn kinds(&self) -> Vec<StrategyKind> {
    self.strategies.iter().map(Strategy::kind).collect()
  }

  pub fn strategies(&self) -> &[Strategy] {
    &self.strategies
  }

  /// True once the merged stream has ended and every group is flushed.
  pub fn is_finished(&self) -> bool {
    self.finished && self.pending.is_empty()
  }
}

impl Iterator for Correlated<'_> {
  type Item = Emission;

  fn next(&mut self) -> Option<Emission> {
    loop {
      if let Some(emission) = self.pending.pop_front() {
        return Some(emission);
      }
      if self.finished {
        return None;
      }
      match self.merger.next() {
        Some(entry) => {
          self.records_seen += 1;
          for strategy in &mut self.strategies {
            strategy.observe(&entry, &mut self.pending);
          }
        }
        None => {
          for strategy in &mut self.strategies {
            strategy.finish(&mut self.pending);
          }
          self.finished = true;
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::types::{CorrelationIds, Record, Source};
  use chrono::{Duration, TimeZone, Utc};

  fn record(id: &str, secs: i64, request_id: Option<&str>) -> Record {
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap() + Duration::seconds(secs);
    Record::new(id).at(ts).with_ids(CorrelationIds {
      request_id: request_id.map(str::to_string),
      ..Default::default()
    })
  }

  fn correlated(sources: Vec<Source<'static>>) -> Correlated<'static> {
    let config = Config::default();
    let strategies = [StrategyKind::Identifier, StrategyKind::TimeWindow]
      .into_iter()
      .map(|k| Strategy::new(k, &config))
      .collect();
    Correlated::new(Merger::new(sources), strategies)
  }

  #[test]
  fn every_strategy_sees_every_record() {
    let a = Source::new("a", vec![record("a0", 0, Some("req-1")), record("a1", 10, None)]);
    let b = Source::new("b", vec![record("b0", 0, Some("req-1"))]);
    let mut stream = correlated(vec![a, b]);
    let emissions: Vec<Emission> = stream.by_ref().collect();

    assert_eq!(stream.records_seen(), 3);
    assert!(stream.is_finished());

    let groups_by = |kind: StrategyKind| {
      emissions
        .iter()
        .filter(|e| matches!(e, Emission::Group(g) if g.kind == kind))
        .count()
    };
    assert_eq!(groups_by(StrategyKind::Identifier), 1);
    assert_eq!(groups_by(StrategyKind::TimeWindow), 2);

    let identifier_orphans = emissions
      .iter()
      .filter(|e| matches!(e, Emission::Orphan { kind: StrategyKind::Identifier, .. }))
      .count();
    assert_eq!(identifier_orphans, 1);
  }

  #[test]
  fn consumer_can_stop_early_on_unbounded_input() {
    let live = Source::new("live", (0..).map(|i| record(&format!("l{}", i), i * 10, None)));
    let idle = Source::new("idle", Vec::new());
    let mut stream = correlated(vec![live, idle]);

    // Every record is an identifier orphan, so output flows without an end.
    let first: Vec<Emission> = stream.by_ref().take(5).collect();
    assert_eq!(first.len(), 5);
    assert!(!stream.is_finished());
    assert_eq!(stream.kinds(), vec![StrategyKind::Identifier, StrategyKind::TimeWindow]);
  }
}
