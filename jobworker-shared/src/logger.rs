//! # Logger façade (C1)
//!
//! A thin wrapper over `tracing` so call sites pass a field bag rather than
//! reaching for `tracing::info!` directly — this is what lets C6 "derive a
//! logger scope bearing `taskType`, `jobKey`, `processInstanceKey`" be a
//! concrete, testable method instead of ambient global state. Logging calls
//! never fail observably: a misconfigured sink degrades to no-op.

use std::fmt;

use crate::error::ErrorRecord;

/// A key-value field, rendered through `tracing`'s structured fields.
#[derive(Debug, Clone)]
pub struct Field(pub &'static str, pub String);

impl Field {
    pub fn new(key: &'static str, value: impl fmt::Display) -> Self {
        Field(key, value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Production,
    Test,
    NoOp,
}

/// Structured logger carrying a fixed field bag merged into every call.
#[derive(Debug, Clone)]
pub struct Logger {
    sink: Sink,
    fields: Vec<Field>,
}

impl Logger {
    /// Production sink: JSON-line structured logging via `tracing`'s global
    /// subscriber. Call `install_production_subscriber()` once at process
    /// start to actually wire a sink; this constructor just tags the
    /// severity calls as going through the production path.
    pub fn production() -> Self {
        Self {
            sink: Sink::Production,
            fields: Vec::new(),
        }
    }

    /// Test sink: routes through `tracing_subscriber`'s test writer so
    /// output interleaves correctly with the test harness.
    pub fn test() -> Self {
        Self {
            sink: Sink::Test,
            fields: Vec::new(),
        }
    }

    /// No-op sink: every call is dropped. Used when a task is constructed
    /// without a configured logger (e.g. unit tests of pure arithmetic).
    pub fn noop() -> Self {
        Self {
            sink: Sink::NoOp,
            fields: Vec::new(),
        }
    }

    /// Derive a child logger carrying `fields` merged into every subsequent
    /// call, in addition to this logger's own fields.
    #[must_use]
    pub fn child(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut merged = self.fields.clone();
        merged.extend(fields);
        Self {
            sink: self.sink,
            fields: merged,
        }
    }

    /// Derive a child logger with an [`ErrorRecord`] attached under the
    /// reserved `error` field.
    #[must_use]
    pub fn with_error(&self, err: &ErrorRecord) -> Self {
        self.child([
            Field::new("error", &err.message),
            Field::new("error_kind", err.kind.wire_code("")),
        ])
    }

    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.emit(Level::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: &[Field]) {
        self.emit(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.emit(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: &[Field]) {
        self.emit(Level::Error, message, fields);
    }

    fn emit(&self, level: Level, message: &str, call_fields: &[Field]) {
        if self.sink == Sink::NoOp {
            return;
        }
        let rendered = render_fields(&self.fields, call_fields);
        match (self.sink, level) {
            (_, Level::Debug) => tracing::debug!(fields = %rendered, "{}", message),
            (_, Level::Info) => tracing::info!(fields = %rendered, "{}", message),
            (_, Level::Warn) => tracing::warn!(fields = %rendered, "{}", message),
            (_, Level::Error) => tracing::error!(fields = %rendered, "{}", message),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

fn render_fields(base: &[Field], extra: &[Field]) -> String {
    base.iter()
        .chain(extra.iter())
        .map(|f| format!("{}={}", f.0, f.1))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Install the production `tracing_subscriber` sink. Idempotent-ish: calling
/// it twice in one process will panic (tracing's global default can only be
/// set once), matching `tracing`'s own contract — callers invoke this once
/// from `main`.
pub fn install_production_subscriber() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_merges_fields() {
        let base = Logger::test().child([Field::new("task_type", "email_send")]);
        let child = base.child([Field::new("job_key", 42)]);
        assert_eq!(child.fields.len(), 2);
        assert_eq!(child.fields[0].0, "task_type");
        assert_eq!(child.fields[1].0, "job_key");
    }

    #[test]
    fn with_error_attaches_reserved_fields() {
        let logger = Logger::test();
        let err = ErrorRecord::new(crate::error::ErrorKind::SmtpError, "dial timeout");
        let child = logger.with_error(&err);
        assert!(child.fields.iter().any(|f| f.0 == "error"));
        assert!(child.fields.iter().any(|f| f.0 == "error_kind"));
    }

    #[test]
    fn noop_logger_never_panics() {
        let logger = Logger::noop();
        logger.debug("x", &[]);
        logger.info("x", &[]);
        logger.warn("x", &[]);
        logger.error("x", &[]);
    }

    #[test]
    fn production_and_test_loggers_emit_without_panicking() {
        let logger = Logger::test().child([Field::new("worker_id", "w-1")]);
        logger.info("job activated", &[Field::new("job_key", 7)]);

        let prod = Logger::production();
        prod.warn("degraded sink", &[]);
    }
}
