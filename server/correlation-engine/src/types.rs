//! Core types for the correlation engine (JSON contracts + internal models).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: one normalized record per line)
// ---------------------------------------------------------------------------

/// One inbound record line. Unknown fields are silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundRecord {
  #[serde(default)]
  pub id: Option<String>,
  /// RFC3339 / naive date-time string, or epoch seconds as a number.
  #[serde(default)]
  pub timestamp: Option<serde_json::Value>,
  #[serde(default)]
  pub level: Option<String>,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub request_id: Option<String>,
  #[serde(default)]
  pub trace_id: Option<String>,
  #[serde(default)]
  pub span_id: Option<String>,
  #[serde(default)]
  pub correlation_id: Option<String>,
  #[serde(default)]
  pub transaction_id: Option<String>,
  #[serde(default)]
  pub session_id: Option<String>,
  #[serde(default)]
  pub user_id: Option<String>,
}

/// A named, lazily evaluated stream of records. Sources may be unbounded.
pub struct Source<'a> {
  pub name: Arc<str>,
  pub records: Box<dyn Iterator<Item = Record> + 'a>,
}

impl<'a> Source<'a> {
  pub fn new<I>(name: impl Into<String>, records: I) -> Self
  where
    I: IntoIterator<Item = Record>,
    I::IntoIter: 'a,
  {
    Self {
      name: Arc::from(name.into()),
      records: Box::new(records.into_iter()),
    }
  }
}

impl fmt::Debug for Source<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Source").field("name", &self.name).finish_non_exhaustive()
  }
}

// ---------------------------------------------------------------------------
// Normalized record
// ---------------------------------------------------------------------------

/// Opaque record token assigned by the parsing layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

/// Where a record was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceRef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<u64>,
}

/// Identifiers used to link records across systems.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationIds {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub request_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trace_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub span_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub correlation_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub transaction_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
}

/// Canonical normalized log record. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
  pub id: RecordId,
  pub timestamp: Option<DateTime<Utc>>,
  pub source: SourceRef,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub level: Option<String>,
  pub message: String,
  #[serde(rename = "correlation")]
  pub ids: CorrelationIds,
}

impl Record {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: RecordId(id.into()),
      timestamp: None,
      source: SourceRef::default(),
      level: None,
      message: String::new(),
      ids: CorrelationIds::default(),
    }
  }

  pub fn at(mut self, ts: DateTime<Utc>) -> Self {
    self.timestamp = Some(ts);
    self
  }

  pub fn with_ids(mut self, ids: CorrelationIds) -> Self {
    self.ids = ids;
    self
  }
}

/// A record after merging: tagged with its arrival sequence and origin source.
///
/// `seq` is unique within one run and serves as the record identity when
/// de-duplicating across strategies.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
  pub seq: u64,
  pub origin: Arc<str>,
  pub record: Arc<Record>,
}

impl Entry {
  pub fn timestamp(&self) -> Option<DateTime<Utc>> {
    self.record.timestamp
  }
}

// ---------------------------------------------------------------------------
// Strategies and groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
  Identifier,
  TimeWindow,
  Session,
}

impl StrategyKind {
  pub const ALL: [StrategyKind; 3] = [Self::Identifier, Self::TimeWindow, Self::Session];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Identifier => "identifier",
      Self::TimeWindow => "time_window",
      Self::Session => "session",
    }
  }

  /// Accepts canonical names plus the legacy aliases used by older CLIs.
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "identifier" | "id" | "request_id" => Some(Self::Identifier),
      "time_window" | "timestamp" | "timestamp_window" | "window" => Some(Self::TimeWindow),
      "session" => Some(Self::Session),
      _ => None,
    }
  }
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Why a group stopped accepting records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
  /// Still open when the stream ended.
  Flushed,
  /// Pushed out to stay within capacity.
  Evicted,
  /// Session inactivity gap exceeded the timeout.
  TimedOut,
}

/// Stable identifier of an emitted group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

/// A completed correlation group. Immutable once emitted.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
  pub id: GroupId,
  pub key: String,
  pub kind: StrategyKind,
  pub close_reason: CloseReason,
  pub sources: BTreeSet<String>,
  pub time_range: Option<TimeRange>,
  /// Sorted by timestamp (untimestamped last), ties by arrival sequence.
  pub members: Vec<Entry>,
}

impl Group {
  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }

  pub fn duration_ms(&self) -> Option<i64> {
    self
      .time_range
      .map(|r| (r.end - r.start).num_milliseconds())
  }
}

/// One unit of strategy output.
#[derive(Debug, Clone)]
pub enum Emission {
  Group(Group),
  Orphan { kind: StrategyKind, entry: Entry },
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what we emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StrategyStats {
  pub groups: usize,
  pub grouped_entries: usize,
  pub evicted_groups: usize,
  pub orphans: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
  pub total_groups: usize,
  pub total_entries: u64,
  pub correlated_entries: u64,
  pub orphan_entries: u64,
  pub correlation_rate: f64,
  pub sources_covered: usize,
  pub avg_group_size: f64,
  pub per_strategy: BTreeMap<StrategyKind, StrategyStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
  pub groups: Vec<Group>,
  /// Records orphaned by every requested strategy, in arrival order.
  pub orphans: Vec<Entry>,
  pub statistics: Statistics,
}

impl CorrelationResult {
  pub fn groups_of(&self, kind: StrategyKind) -> impl Iterator<Item = &Group> {
    self.groups.iter().filter(move |g| g.kind == kind)
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for a failed run.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
