//! Integration tests for the correlation engine.

use correlation_engine::normalize::normalize;
use correlation_engine::types::CloseReason;
use correlation_engine::{
  correlate, Config, CorrelationResult, Engine, InboundRecord, Source, StrategyKind, StrategySet,
};

/// Parse JSON lines the way the binary does: one InboundRecord per line.
fn source(name: &str, lines: &str) -> Source<'static> {
  let records: Vec<_> = lines
    .lines()
    .map(str::trim)
    .filter(|l| !l.is_empty())
    .enumerate()
    .map(|(idx, line)| {
      let raw: InboundRecord = serde_json::from_str(line).unwrap();
      normalize(&raw, name, idx as u64 + 1)
    })
    .collect();
  Source::new(name, records)
}

fn app_log() -> &'static str {
  r#"
    {"timestamp": "2025-01-15T10:00:00Z", "level": "INFO", "message": "GET /api/pay", "request_id": "req-1", "user_id": "alice"}
    {"timestamp": "2025-01-15T10:00:05Z", "level": "ERROR", "message": "payment failed", "request_id": "req-1", "user_id": "alice"}
    {"timestamp": "2025-01-15T10:20:00Z", "level": "INFO", "message": "GET /api/cart", "request_id": "req-2", "user_id": "alice"}
    {"timestamp": "2025-01-15T11:30:00Z", "level": "INFO", "message": "GET /api/home", "request_id": "req-3", "user_id": "alice"}
  "#
}

fn nginx_log() -> &'static str {
  r#"
    {"timestamp": "2025-01-15 10:00:01", "message": "POST /api/pay 500", "request_id": "req-1", "upstream_ms": 512}
    {"timestamp": "2025-01-15T10:20:00.400Z", "message": "GET /api/cart 200", "request_id": "req-2"}
    {"timestamp": "not a time", "message": "healthcheck"}
  "#
}

fn run(strategy: &str) -> CorrelationResult {
  let config = Config {
    strategies: strategy.parse().unwrap(),
    ..Config::default()
  };
  Engine::new(config)
    .correlate(vec![source("app.log", app_log()), source("nginx.log", nginx_log())])
    .unwrap()
}

#[test]
fn request_id_groups_span_sources() {
  let result = run("request_id");
  let req1 = result.groups.iter().find(|g| g.key == "req-1").unwrap();

  assert_eq!(req1.len(), 3);
  assert_eq!(req1.sources.len(), 2);
  assert!(req1.sources.contains("app.log") && req1.sources.contains("nginx.log"));
  assert_eq!(req1.duration_ms(), Some(5_000));
  assert_eq!(req1.close_reason, CloseReason::Flushed);
  assert!(req1.id.0.starts_with("grp-"));

  let messages: Vec<&str> = req1.members.iter().map(|m| m.record.message.as_str()).collect();
  assert_eq!(messages, vec!["GET /api/pay", "POST /api/pay 500", "payment failed"]);

  // Only the healthcheck line has no identifier.
  assert_eq!(result.orphans.len(), 1);
  assert_eq!(result.orphans[0].record.message, "healthcheck");
  assert_eq!(result.statistics.total_entries, 7);
  assert_eq!(result.statistics.correlated_entries, 6);
}

#[test]
fn time_window_groups_nearby_records() {
  let result = run("timestamp");
  let spans: Vec<usize> = result.groups.iter().map(|g| g.len()).collect();
  // 10:00:00 + 10:00:01 chain; 10:00:05, 10:20:00(+0.4s), 11:30:00 stand apart.
  assert_eq!(spans, vec![2, 1, 2, 1]);
  assert!(result.groups[0].key.starts_with("window:2025-01-15T10:00:00"));
  // The record with an unparsable timestamp cannot be placed in time.
  assert_eq!(result.orphans.len(), 1);
}

#[test]
fn session_splits_on_inactivity() {
  let result = run("session");
  let sessions: Vec<(usize, CloseReason)> =
    result.groups.iter().map(|g| (g.len(), g.close_reason)).collect();
  // 10:00 to 10:20 stays within 30 minutes; 11:30 starts a new session.
  assert_eq!(sessions, vec![(3, CloseReason::TimedOut), (1, CloseReason::Flushed)]);
  assert!(result.groups.iter().all(|g| g.key == "user:alice"));
  assert_ne!(result.groups[0].id, result.groups[1].id);
}

#[test]
fn all_strategies_union_groups_and_intersect_orphans() {
  let result = run("all");
  for kind in StrategyKind::ALL {
    assert!(result.groups_of(kind).count() > 0, "{} produced no groups", kind);
  }
  assert_eq!(result.orphans.len(), 1);
  assert_eq!(result.orphans[0].record.message, "healthcheck");

  let stats = &result.statistics;
  assert_eq!(stats.total_groups, result.groups.len());
  assert_eq!(stats.correlated_entries + stats.orphan_entries, stats.total_entries);
  assert_eq!(stats.sources_covered, 2);
  assert_eq!(stats.per_strategy.len(), 3);
}

#[test]
fn deterministic_output_across_runs() {
  let json1 = serde_json::to_string(&run("all")).unwrap();
  let json2 = serde_json::to_string(&run("all")).unwrap();
  assert_eq!(json1, json2, "Same inputs must produce identical JSON output");
}

#[test]
fn result_serializes_with_stable_field_names() {
  let value = serde_json::to_value(run("identifier")).unwrap();
  let group = &value["groups"][0];
  assert_eq!(group["kind"], "identifier");
  assert_eq!(group["close_reason"], "flushed");
  assert!(group["members"][0]["record"]["correlation"]["request_id"].is_string());
  assert!(value["statistics"]["per_strategy"]["identifier"].is_object());
  assert!(value["statistics"]["correlation_rate"].is_number());
}

#[test]
fn unknown_strategy_gives_clear_error() {
  let err = "identifier,magic".parse::<StrategySet>().unwrap_err();
  assert!(err.is_configuration());
  assert!(err.to_string().contains("magic"), "Error should name the strategy: {}", err);
}

#[test]
fn single_source_is_rejected_by_default() {
  let err = Engine::with_defaults()
    .correlate(vec![source("app.log", app_log())])
    .unwrap_err();
  assert!(err.is_configuration());
}

#[test]
fn free_function_applies_limits() {
  let sources = vec![source("app.log", app_log()), source("nginx.log", nginx_log())];
  // A two-hour window chains every timestamped record together.
  let result = correlate(
    sources,
    StrategySet::only(StrategyKind::TimeWindow),
    7200.0,
    1800.0,
    10,
  )
  .unwrap();
  assert_eq!(result.groups.len(), 1);
  assert_eq!(result.groups[0].len(), 6);

  let sources = vec![Source::new("a", Vec::new()), Source::new("b", Vec::new())];
  let err = correlate(sources, StrategySet::all(), 1.0, 1800.0, 0).unwrap_err();
  assert!(err.to_string().contains("capacity"));
}

#[test]
fn lazy_stream_stops_early_on_unbounded_source() {
  use correlation_engine::types::{CorrelationIds, Record};
  use chrono::{Duration, TimeZone, Utc};

  let start = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
  let endless = Source::new(
    "endless",
    (0i64..).map(move |i| {
      Record::new(format!("e{}", i))
        .at(start + Duration::seconds(i * 60))
        .with_ids(CorrelationIds {
          request_id: Some(format!("req-{}", i)),
          ..Default::default()
        })
    }),
  );
  let engine = Engine::new(Config {
    strategies: StrategySet::only(StrategyKind::Identifier),
    capacity: 4,
    ..Config::default()
  });
  let stream = engine.stream(vec![endless, source("nginx.log", nginx_log())]).unwrap();

  // Capacity 4 forces evictions, so groups surface without the stream ending.
  let first: Vec<_> = stream.take(10).collect();
  assert_eq!(first.len(), 10);
}
