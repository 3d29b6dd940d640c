//! Binary entrypoint: correlate JSON-lines log files, write the result to stdout.
//!
//! Usage: `correlation-engine <file> <file> [...]`
//!
//! Each file is one source; each line is an InboundRecord. Output is a single
//! CorrelationResult JSON document, or an ErrorOutput when the run fails.
//! Limits come from `CORRELATE_*` environment variables, logs go to stderr.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use correlation_engine::normalize::normalize;
use correlation_engine::types::ErrorOutput;
use correlation_engine::{Config, CorrelationError, Engine, InboundRecord, Source};
use tracing_subscriber::prelude::*;

fn main() {
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  let outcome = Config::from_env().and_then(|config| {
    let sources: Vec<Source<'static>> = std::env::args().skip(1).filter_map(open_source).collect();
    Engine::new(config).correlate(sources)
  });

  let code = match outcome {
    // Serialized up front so a failure never leaves a partial document on stdout.
    Ok(result) => match serde_json::to_vec(&result) {
      Ok(bytes) => {
        let _ = out.write_all(&bytes);
        0
      }
      Err(e) => {
        write_error(&mut out, &CorrelationError::from(e));
        1
      }
    },
    Err(e) => {
      write_error(&mut out, &e);
      1
    }
  };

  let _ = writeln!(out);
  let _ = out.flush();
  std::process::exit(code);
}

/// Open `path` as a lazily read source. Unreadable files are reported and skipped;
/// bad lines are skipped and only an I/O error ends the source early.
fn open_source(path: String) -> Option<Source<'static>> {
  let file = match File::open(&path) {
    Ok(f) => f,
    Err(e) => {
      let err = CorrelationError::unreadable(path, e);
      tracing::warn!(error = %err, "skipping source");
      return None;
    }
  };

  let origin = path.clone();
  let records = BufReader::new(file)
    .split(b'\n')
    .enumerate()
    .map_while(move |(idx, line)| match line {
      Ok(bytes) => Some((idx as u64 + 1, bytes)),
      Err(e) => {
        tracing::warn!(source = %origin, error = %e, "read error, ending source");
        None
      }
    })
    .filter_map({
      let origin = path.clone();
      move |(line_no, bytes)| {
        let line = match String::from_utf8(bytes) {
          Ok(l) => l,
          Err(e) => {
            tracing::warn!(source = %origin, line = line_no, error = %e, "skipping line that is not UTF-8");
            return None;
          }
        };
        // Skip blank lines.
        let trimmed = line.trim();
        if trimmed.is_empty() {
          return None;
        }
        match serde_json::from_str::<InboundRecord>(trimmed) {
          Ok(raw) => Some(normalize(&raw, &origin, line_no)),
          Err(e) => {
            tracing::warn!(source = %origin, line = line_no, error = %e, "skipping malformed line");
            None
          }
        }
      }
    });

  Some(Source::new(path, records))
}

fn write_error(out: &mut impl Write, e: &CorrelationError) {
  let err = match e {
    CorrelationError::Configuration { field, reason } => {
      ErrorOutput::new(reason.clone()).with_field(field.clone())
    }
    _ => ErrorOutput::new(e.to_string()),
  };
  let _ = serde_json::to_writer(&mut *out, &err);
}
