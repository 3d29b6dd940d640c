//! Normalize inbound JSON records into canonical internal Records.
//!
//! Per-record problems never fail: an unparsable timestamp becomes `None` and
//! the record is still correlated by identifier.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::keys;
use crate::types::*;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Build a Record from one inbound line read from `origin` at `line` (1-based).
pub fn normalize(raw: &InboundRecord, origin: &str, line: u64) -> Record {
  let timestamp = raw.timestamp.as_ref().and_then(timestamp_from_value);
  if timestamp.is_none() && raw.timestamp.is_some() {
    tracing::debug!(origin, line, "unparsable timestamp, record kept without one");
  }

  let id = match clean(&raw.id) {
    Some(id) => RecordId(id),
    None => keys::derive_record_id(origin, line, &raw.message),
  };

  Record {
    id,
    timestamp,
    source: SourceRef {
      path: Some(origin.to_string()),
      line: Some(line),
    },
    level: clean(&raw.level).map(|l| l.to_ascii_lowercase()),
    message: raw.message.clone(),
    ids: CorrelationIds {
      request_id: clean(&raw.request_id),
      trace_id: clean(&raw.trace_id),
      span_id: clean(&raw.span_id),
      correlation_id: clean(&raw.correlation_id),
      transaction_id: clean(&raw.transaction_id),
      session_id: clean(&raw.session_id),
      user_id: clean(&raw.user_id),
    },
  }
}

/// Parse a timestamp string: RFC3339, or naive date-time taken as UTC, or epoch seconds.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if s.is_empty() {
    return None;
  }
  if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
    return Some(ts.with_timezone(&Utc));
  }
  for fmt in NAIVE_FORMATS {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(Utc.from_utc_datetime(&naive));
    }
  }
  s.parse::<f64>().ok().and_then(from_epoch_seconds)
}

fn timestamp_from_value(value: &Value) -> Option<DateTime<Utc>> {
  match value {
    Value::String(s) => parse_timestamp(s),
    Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
    _ => None,
  }
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
  if !secs.is_finite() || secs < 0.0 {
    return None;
  }
  let whole = secs.trunc() as i64;
  let nanos = ((secs - secs.trunc()) * 1e9).round().min(999_999_999.0) as u32;
  DateTime::from_timestamp(whole, nanos)
}

/// Trimmed value, or `None` when missing or blank.
fn clean(value: &Option<String>) -> Option<String> {
  value
    .as_deref()
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}
