//! Structured error types for the correlation engine.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrelationError {
  /// Invalid configuration. Raised before any source is read.
  #[error("configuration: {field}: {reason}")]
  Configuration { field: String, reason: String },

  #[error("source {path}: {source}")]
  Source { path: String, source: io::Error },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl CorrelationError {
  pub fn configuration(field: &str, reason: impl Into<String>) -> Self {
    Self::Configuration {
      field: field.to_string(),
      reason: reason.into(),
    }
  }

  pub fn unreadable(path: impl Into<String>, source: io::Error) -> Self {
    Self::Source {
      path: path.into(),
      source,
    }
  }

  pub fn is_configuration(&self) -> bool {
    matches!(self, Self::Configuration { .. })
  }
}
