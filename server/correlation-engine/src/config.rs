//! Engine configuration with sane defaults.

use std::str::FromStr;

use chrono::Duration;

use crate::error::CorrelationError;
use crate::types::StrategyKind;

/// Longest window or session timeout accepted, in seconds (about 31 years).
const MAX_SECONDS: f64 = 1.0e9;

/// Non-empty, de-duplicated set of strategies in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySet(Vec<StrategyKind>);

impl StrategySet {
  pub fn all() -> Self {
    Self(StrategyKind::ALL.to_vec())
  }

  pub fn only(kind: StrategyKind) -> Self {
    Self(vec![kind])
  }

  pub fn kinds(&self) -> &[StrategyKind] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Default for StrategySet {
  fn default() -> Self {
    Self::all()
  }
}

impl FromIterator<StrategyKind> for StrategySet {
  fn from_iter<T: IntoIterator<Item = StrategyKind>>(iter: T) -> Self {
    let mut kinds: Vec<StrategyKind> = iter.into_iter().collect();
    kinds.sort();
    kinds.dedup();
    Self(kinds)
  }
}

impl FromStr for StrategySet {
  type Err = CorrelationError;

  /// Parses `all`, a single strategy name, or a comma-separated subset.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut kinds = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
      if name.eq_ignore_ascii_case("all") {
        kinds.extend(StrategyKind::ALL);
        continue;
      }
      let kind = StrategyKind::from_str_loose(name).ok_or_else(|| {
        CorrelationError::configuration(
          "strategy",
          format!("unknown strategy '{}': expected identifier|time_window|session|all", name),
        )
      })?;
      kinds.push(kind);
    }
    if kinds.is_empty() {
      return Err(CorrelationError::configuration("strategy", "no strategy given"));
    }
    Ok(kinds.into_iter().collect())
  }
}

/// Tunable limits for one correlation run.
#[derive(Debug, Clone)]
pub struct Config {
  pub strategies: StrategySet,
  /// Max gap between a record and a time-window group's last record.
  pub window_seconds: f64,
  /// Inactivity gap after which a session key starts a new group.
  pub session_timeout_secs: f64,
  /// Max concurrently open groups per strategy.
  pub capacity: usize,
  /// Fewest sources a run accepts.
  pub min_sources: usize,
  /// Closing groups smaller than this release their members as orphans.
  pub min_group_size: usize,
  /// Closing groups touching a single source release their members as orphans.
  pub require_multiple_sources: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      strategies: StrategySet::all(),
      window_seconds: 1.0,
      session_timeout_secs: 1800.0,
      capacity: 10_000,
      min_sources: 2,
      min_group_size: 1,
      require_multiple_sources: false,
    }
  }
}

impl Config {
  /// Defaults overlaid with `CORRELATE_*` environment variables.
  pub fn from_env() -> Result<Self, CorrelationError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Defaults overlaid with whatever `lookup` returns for each `CORRELATE_*` key.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, CorrelationError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let mut config = Self::default();
    if let Some(v) = lookup("CORRELATE_STRATEGY") {
      config.strategies = v.parse()?;
    }
    if let Some(v) = lookup("CORRELATE_WINDOW_SECONDS") {
      config.window_seconds = parse_var("window_seconds", &v)?;
    }
    if let Some(v) = lookup("CORRELATE_SESSION_TIMEOUT") {
      config.session_timeout_secs = parse_var("session_timeout", &v)?;
    }
    if let Some(v) = lookup("CORRELATE_CAPACITY") {
      config.capacity = parse_var("capacity", &v)?;
    }
    if let Some(v) = lookup("CORRELATE_MIN_SOURCES") {
      config.min_sources = parse_var("min_sources", &v)?;
    }
    if let Some(v) = lookup("CORRELATE_MIN_GROUP_SIZE") {
      config.min_group_size = parse_var("min_group_size", &v)?;
    }
    if let Some(v) = lookup("CORRELATE_REQUIRE_MULTIPLE_SOURCES") {
      config.require_multiple_sources = parse_var("require_multiple_sources", &v)?;
    }
    Ok(config)
  }

  /// Reject structurally invalid settings before any work starts.
  pub fn validate(&self) -> Result<(), CorrelationError> {
    if self.strategies.is_empty() {
      return Err(CorrelationError::configuration("strategy", "no strategy given"));
    }
    check_seconds("window_seconds", self.window_seconds)?;
    check_seconds("session_timeout", self.session_timeout_secs)?;
    if self.capacity == 0 {
      return Err(CorrelationError::configuration("capacity", "must be at least 1"));
    }
    if self.min_sources == 0 {
      return Err(CorrelationError::configuration("min_sources", "must be at least 1"));
    }
    if self.min_group_size == 0 {
      return Err(CorrelationError::configuration("min_group_size", "must be at least 1"));
    }
    Ok(())
  }

  pub fn window(&self) -> Duration {
    seconds_to_duration(self.window_seconds)
  }

  pub fn session_timeout(&self) -> Duration {
    seconds_to_duration(self.session_timeout_secs)
  }
}

fn check_seconds(field: &str, secs: f64) -> Result<(), CorrelationError> {
  if !secs.is_finite() || secs <= 0.0 {
    return Err(CorrelationError::configuration(
      field,
      format!("must be a positive number of seconds, got {}", secs),
    ));
  }
  if secs > MAX_SECONDS {
    return Err(CorrelationError::configuration(
      field,
      format!("must not exceed {} seconds", MAX_SECONDS),
    ));
  }
  Ok(())
}

fn parse_var<T: FromStr>(field: &str, raw: &str) -> Result<T, CorrelationError> {
  raw
    .trim()
    .parse()
    .map_err(|_| CorrelationError::configuration(field, format!("cannot parse '{}'", raw)))
}

/// Microsecond precision; callers validate the range first.
fn seconds_to_duration(secs: f64) -> Duration {
  Duration::microseconds((secs * 1_000_000.0).round() as i64)
}
