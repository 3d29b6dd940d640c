//! Core engine: validate, merge, tee into strategies, assemble the result.

use std::collections::BTreeMap;

use crate::combine::Correlated;
use crate::config::{Config, StrategySet};
use crate::error::CorrelationError;
use crate::merge::Merger;
use crate::stats::Tally;
use crate::strategy::Strategy;
use crate::types::*;

/// The correlation engine. Holds only configuration; every run owns its state.
#[derive(Debug, Clone)]
pub struct Engine {
  config: Config,
}

impl Engine {
  pub fn new(config: Config) -> Self {
    Self { config }
  }

  pub fn with_defaults() -> Self {
    Self::new(Config::default())
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Lazy emission sequence for consumers that may stop early.
  ///
  /// Configuration is checked before any source is pulled.
  pub fn stream<'a>(&self, sources: Vec<Source<'a>>) -> Result<Correlated<'a>, CorrelationError> {
    self.config.validate()?;
    if sources.len() < self.config.min_sources {
      return Err(CorrelationError::configuration(
        "sources",
        format!(
          "need at least {} sources, got {}",
          self.config.min_sources,
          sources.len()
        ),
      ));
    }

    let strategies = self
      .config
      .strategies
      .kinds()
      .iter()
      .map(|&kind| Strategy::new(kind, &self.config))
      .collect();
    Ok(Correlated::new(Merger::new(sources), strategies))
  }

  /// Run to completion and collect groups, global orphans and statistics.
  ///
  /// A record is a global orphan only when every requested strategy
  /// orphaned it.
  pub fn correlate(&self, sources: Vec<Source<'_>>) -> Result<CorrelationResult, CorrelationError> {
    let mut stream = self.stream(sources)?;
    let kinds = stream.kinds();
    let mut tally = Tally::new(&kinds);
    let mut groups = Vec::new();
    // seq -> (strategies that orphaned it, entry)
    let mut orphan_hits: BTreeMap<u64, (usize, Entry)> = BTreeMap::new();

    for emission in stream.by_ref() {
      tally.record(&emission);
      match emission {
        Emission::Group(group) => groups.push(group),
        Emission::Orphan { entry, .. } => {
          orphan_hits.entry(entry.seq).or_insert((0, entry)).0 += 1;
        }
      }
    }

    for strategy in stream.strategies() {
      tally.set_evicted(strategy.kind(), strategy.evicted());
    }
    let statistics = tally.finish(stream.records_seen());

    let orphans: Vec<Entry> = orphan_hits
      .into_values()
      .filter(|(hits, _)| *hits == kinds.len())
      .map(|(_, entry)| entry)
      .collect();

    tracing::info!(
      strategies = ?kinds,
      entries = statistics.total_entries,
      groups = statistics.total_groups,
      orphans = orphans.len(),
      rate = statistics.correlation_rate,
      "correlation run complete"
    );

    Ok(CorrelationResult {
      groups,
      orphans,
      statistics,
    })
  }
}

/// Correlate `sources` with the given strategies and limits, defaults elsewhere.
pub fn correlate(
  sources: Vec<Source<'_>>,
  strategies: StrategySet,
  window_seconds: f64,
  session_timeout_secs: f64,
  capacity: usize,
) -> Result<CorrelationResult, CorrelationError> {
  let engine = Engine::new(Config {
    strategies,
    window_seconds,
    session_timeout_secs,
    capacity,
    ..Config::default()
  });
  engine.correlate(sources)
}
