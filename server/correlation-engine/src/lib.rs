//! Multi-source log correlation engine.
//!
//! Merges per-source record streams into one near-chronological stream, runs
//! it through up to three correlation strategies (shared identifier, temporal
//! proximity, session continuity) and reports the resulting groups, the
//! records no strategy could place, and run statistics.
//!
//! Pull-based and single pass: memory is bounded by the number of sources and
//! by the per-strategy open-group capacity, so sources may be unbounded.

pub mod combine;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod identifier;
pub mod keys;
pub mod merge;
pub mod normalize;
pub mod recency;
pub mod session;
pub mod stats;
pub mod strategy;
pub mod types;
pub mod window;

pub use config::{Config, StrategySet};
pub use engine::{correlate, Engine};
pub use error::CorrelationError;
pub use types::{CorrelationResult, Group, InboundRecord, Record, Source, StrategyKind};
