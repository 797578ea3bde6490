// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured daemon log: newline-delimited JSON with size-based rotation.
//!
//! Each line is `{"ts": …, "level": …, "component": …, "msg": …, "data": …}`
//! where `component` is the tracing target and `data` carries any extra
//! fields. Rotation shifts `hqd.log → hqd.log.1 → … → hqd.log.N` and
//! unlinks the oldest; it runs at startup, before the appender opens.

use hq_core::{Config, LoggingSection};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Errors from logger setup.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("log file has no parent directory: {0}")]
    NoParent(std::path::PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// NDJSON event formatter.
struct NdjsonFormat;

#[derive(Default)]
struct FieldCollector {
    message: String,
    data: Map<String, Value>,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.data.insert(field.name().to_string(), Value::String(format!("{value:?}")));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.data.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.data.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.data.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.data.insert(field.name().to_string(), Value::from(value));
    }
}

impl<S, N> FormatEvent<S, N> for NdjsonFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        let mut line = Map::new();
        line.insert("ts".to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
        line.insert(
            "level".to_string(),
            Value::String(event.metadata().level().as_str().to_lowercase()),
        );
        line.insert(
            "component".to_string(),
            Value::String(component_of(event.metadata().target())),
        );
        line.insert("msg".to_string(), Value::String(collector.message));
        if !collector.data.is_empty() {
            line.insert("data".to_string(), Value::Object(collector.data));
        }

        writeln!(writer, "{}", Value::Object(line))
    }
}

/// Strip the crate/module path down to a component name
/// (`hq_daemon::orchestrator` → `orchestrator`).
fn component_of(target: &str) -> String {
    target.rsplit("::").next().unwrap_or(target).to_string()
}

/// Rotate the log if it exceeds the configured size.
///
/// Shifts `<log>.{N-1} → <log>.N` upward, deleting the oldest, then moves
/// the live file to `<log>.1`. Best-effort: rotation failures are ignored
/// so the daemon still starts.
pub fn rotate_log_if_needed(log_path: &Path, logging: &LoggingSection) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < logging.max_log_file_size {
        return;
    }

    let log_str = log_path.display().to_string();
    let max = logging.max_log_files.max(1);

    let oldest = format!("{log_str}.{max}");
    let _ = std::fs::remove_file(&oldest);
    for i in (1..max).rev() {
        let _ = std::fs::rename(format!("{log_str}.{i}"), format!("{log_str}.{}", i + 1));
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Install the global subscriber: NDJSON to the log file, optionally a
/// plain layer on stdout. Returns the guard that flushes the non-blocking
/// writer on drop.
pub fn init(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LoggerError> {
    let log_path = config.log_file();
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    rotate_log_if_needed(&log_path, &config.logging);

    let dir = log_path.parent().ok_or_else(|| LoggerError::NoParent(log_path.clone()))?;
    let file_name =
        log_path.file_name().ok_or_else(|| LoggerError::NoParent(log_path.clone()))?;
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG overrides the configured level when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.log_level.to_string()));

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(NdjsonFormat)
        .with_writer(non_blocking);

    if config.logging.log_to_stdout {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(file_layer).init();
    }

    Ok(guard)
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
