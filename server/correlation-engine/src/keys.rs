//! Stable correlation keys and identifiers.
//!
//! Keys decide which open group a record joins; identifiers name records and
//! emitted groups. Both are deterministic so identical input produces identical
//! output across runs.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{GroupId, Record, RecordId, StrategyKind};

fn present(value: &Option<String>) -> Option<&str> {
  value.as_deref().filter(|v| !v.is_empty())
}

/// Identifier key: request_id > trace_id > correlation_id > transaction_id.
pub fn identifier_key(record: &Record) -> Option<String> {
  let ids = &record.ids;
  present(&ids.request_id)
    .or_else(|| present(&ids.trace_id))
    .or_else(|| present(&ids.correlation_id))
    .or_else(|| present(&ids.transaction_id))
    .map(str::to_string)
}

/// Session key: session_id > user_id, prefixed so the two namespaces never collide.
pub fn session_key(record: &Record) -> Option<String> {
  let ids = &record.ids;
  if let Some(session) = present(&ids.session_id) {
    return Some(format!("session:{}", session));
  }
  present(&ids.user_id).map(|user| format!("user:{}", user))
}

/// Time-window key: the opening record's timestamp.
pub fn window_key(opened_at: &DateTime<Utc>) -> String {
  format!("window:{}", opened_at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Group id: hash of strategy + key + first member's arrival sequence.
pub fn group_id(kind: StrategyKind, key: &str, first_seq: u64) -> GroupId {
  let mut hasher = blake3::Hasher::new();
  hasher.update(kind.as_str().as_bytes());
  hasher.update(b"|");
  hasher.update(key.as_bytes());
  hasher.update(b"|");
  hasher.update(&first_seq.to_le_bytes());
  let hex = hasher.finalize().to_hex();
  GroupId(format!("grp-{}", &hex[..16]))
}

/// Record id for inputs that do not carry one: hash of origin + line + message.
pub fn derive_record_id(origin: &str, line: u64, message: &str) -> RecordId {
  let mut hasher = blake3::Hasher::new();
  hasher.update(origin.as_bytes());
  hasher.update(b"|");
  hasher.update(&line.to_le_bytes());
  hasher.update(b"|");
  hasher.update(message.as_bytes());
  let hex = hasher.finalize().to_hex();
  RecordId(format!("rec-{}", &hex[..16]))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::CorrelationIds;
  use chrono::TimeZone;

  fn record(ids: CorrelationIds) -> Record {
    Record::new("r").with_ids(ids)
  }

  #[test]
  fn identifier_priority_order() {
    let r = record(CorrelationIds {
      trace_id: Some("t-1".into()),
      transaction_id: Some("x-1".into()),
      correlation_id: Some("c-1".into()),
      ..Default::default()
    });
    assert_eq!(identifier_key(&r).as_deref(), Some("t-1"));

    let r = record(CorrelationIds {
      request_id: Some("req-1".into()),
      trace_id: Some("t-1".into()),
      ..Default::default()
    });
    assert_eq!(identifier_key(&r).as_deref(), Some("req-1"));

    let r = record(CorrelationIds {
      transaction_id: Some("x-1".into()),
      ..Default::default()
    });
    assert_eq!(identifier_key(&r).as_deref(), Some("x-1"));
  }

  #[test]
  fn span_and_session_ids_do_not_make_identifier_keys() {
    let r = record(CorrelationIds {
      span_id: Some("s-1".into()),
      session_id: Some("sess".into()),
      user_id: Some("u".into()),
      ..Default::default()
    });
    assert_eq!(identifier_key(&r), None);
  }

  #[test]
  fn empty_strings_are_absent() {
    let r = record(CorrelationIds {
      request_id: Some(String::new()),
      trace_id: Some("t-2".into()),
      session_id: Some(String::new()),
      user_id: Some("alice".into()),
      ..Default::default()
    });
    assert_eq!(identifier_key(&r).as_deref(), Some("t-2"));
    assert_eq!(session_key(&r).as_deref(), Some("user:alice"));
  }

  #[test]
  fn session_prefers_session_id() {
    let r = record(CorrelationIds {
      session_id: Some("abc".into()),
      user_id: Some("alice".into()),
      ..Default::default()
    });
    assert_eq!(session_key(&r).as_deref(), Some("session:abc"));
    assert_eq!(session_key(&Record::new("bare")), None);
  }

  #[test]
  fn window_key_uses_rfc3339() {
    let ts = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
    assert_eq!(window_key(&ts), "window:2025-01-15T10:00:00Z");
  }

  #[test]
  fn group_id_is_stable_and_distinct() {
    let a = group_id(StrategyKind::Identifier, "req-1", 0);
    let b = group_id(StrategyKind::Identifier, "req-1", 0);
    let c = group_id(StrategyKind::Session, "req-1", 0);
    let d = group_id(StrategyKind::Identifier, "req-1", 7);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert!(a.0.starts_with("grp-"));
    assert_eq!(a.0.len(), 20);
  }

  #[test]
  fn derived_record_ids_depend_on_position() {
    let a = derive_record_id("app.log", 1, "boot");
    let b = derive_record_id("app.log", 2, "boot");
    assert_ne!(a, b);
    assert_eq!(a, derive_record_id("app.log", 1, "boot"));
    assert!(a.0[4..].chars().all(|c| c.is_ascii_hexdigit()));
  }
}
