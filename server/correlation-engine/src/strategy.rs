//! The closed set of correlation strategies behind one interface.

use std::collections::VecDeque;

use crate::config::Config;
use crate::group::GroupPolicy;
use crate::identifier::IdentifierStrategy;
use crate::session::SessionStrategy;
use crate::types::{Emission, Entry, Group, StrategyKind};
use crate::window::WindowStrategy;

#[derive(Debug)]
pub enum Strategy {
  Identifier(IdentifierStrategy),
  TimeWindow(WindowStrategy),
  Session(SessionStrategy),
}

impl Strategy {
  /// Fresh strategy state for one run. Callers validate `config` first.
  pub fn new(kind: StrategyKind, config: &Config) -> Self {
    let policy = GroupPolicy::from_config(config);
    match kind {
      StrategyKind::Identifier => Self::Identifier(IdentifierStrategy::new(config.capacity, policy)),
      StrategyKind::TimeWindow => {
        Self::TimeWindow(WindowStrategy::new(config.window(), config.capacity, policy))
      }
      StrategyKind::Session => {
        Self::Session(SessionStrategy::new(config.session_timeout(), config.capacity, policy))
      }
    }
  }

  pub fn kind(&self) -> StrategyKind {
    match self {
      Self::Identifier(_) => StrategyKind::Identifier,
      Self::TimeWindow(_) => StrategyKind::TimeWindow,
      Self::Session(_) => StrategyKind::Session,
    }
  }

  /// Feed one merged record; completed groups and orphans are appended to `out`.
  pub fn observe(&mut self, entry: &Entry, out: &mut VecDeque<Emission>) {
    match self {
      Self::Identifier(s) => s.observe(entry, out),
      Self::TimeWindow(s) => s.observe(entry, out),
      Self::Session(s) => s.observe(entry, out),
    }
  }

  /// End of stream: flush every open group.
  pub fn finish(&mut self, out: &mut VecDeque<Emission>) {
    match self {
      Self::Identifier(s) => s.finish(out),
      Self::TimeWindow(s) => s.finish(out),
      Self::Session(s) => s.finish(out),
    }
  }

  pub fn open_groups(&self) -> usize {
    match self {
      Self::Identifier(s) => s.open_groups(),
      Self::TimeWindow(s) => s.open_groups(),
      Self::Session(s) => s.open_groups(),
    }
  }

  pub fn evicted(&self) -> usize {
    match self {
      Self::Identifier(s) => s.evicted(),
      Self::TimeWindow(s) => s.evicted(),
      Self::Session(s) => s.evicted(),
    }
  }

  /// Run this strategy alone over `stream`, returning its groups and orphans.
  pub fn consume<I>(mut self, stream: I) -> (Vec<Group>, Vec<Entry>)
  where
    I: IntoIterator<Item = Entry>,
  {
    let mut out = VecDeque::new();
    let mut groups = Vec::new();
    let mut orphans = Vec::new();
    let mut drain = |out: &mut VecDeque<Emission>| {
      for emission in out.drain(..) {
        match emission {
          Emission::Group(g) => groups.push(g),
          Emission::Orphan { entry, .. } => orphans.push(entry),
        }
      }
    };
    for entry in stream {
      self.observe(&entry, &mut out);
      drain(&mut out);
    }
    self.finish(&mut out);
    drain(&mut out);
    (groups, orphans)
  }
}
