//! # Error model (C2)
//!
//! A single structured error record that crosses every task/runtime boundary.
//! No bare exception text reaches the orchestrator: every failure is, or has
//! been converted to, an [`ErrorRecord`] carrying a closed [`ErrorKind`] tag.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Closed taxonomy of error kinds, wire-visible where noted in the BPMN error
/// code column. Renaming a wire code breaks existing workflow error
/// boundaries, so these map 1:1 onto the orchestrator contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub enum ErrorKind {
    ParseError,
    ValidationFailed,
    TemplateNotFound,
    TemplateValidationFailed,
    ResponseRootNotObject,
    RedisNotConfigured,
    SessionInvalidationError,
    SmtpError,
    SearchTimeout,
    SearchQueryFailed,
    IndexNotFound,
    ElasticsearchConnectionFailed,
    /// The job adapter's own `execute` deadline elapsed (§4.5, §8) — raised
    /// around every task uniformly, not by the task itself.
    ExecuteTimeout,
    /// Generic per-task default; `wire_code` renders as `"<TASK>_FAILED"`.
    TaskFailed,
    Unknown,
}

impl ErrorKind {
    /// The stable wire code the job adapter throws to the orchestrator
    /// (§7). `task_type` is only consulted for [`ErrorKind::TaskFailed`].
    pub fn wire_code(self, task_type: &str) -> String {
        match self {
            ErrorKind::ParseError => "PARSE_ERROR".to_string(),
            ErrorKind::ValidationFailed => "VALIDATION_FAILED".to_string(),
            ErrorKind::TemplateNotFound => "TEMPLATE_NOT_FOUND".to_string(),
            ErrorKind::TemplateValidationFailed => "TEMPLATE_VALIDATION_FAILED".to_string(),
            ErrorKind::ResponseRootNotObject => "RESPONSE_ROOT_NOT_OBJECT".to_string(),
            ErrorKind::RedisNotConfigured => "REDIS_NOT_CONFIGURED".to_string(),
            ErrorKind::SessionInvalidationError => "SESSION_INVALIDATION_ERROR".to_string(),
            ErrorKind::SmtpError => "SMTP_ERROR".to_string(),
            ErrorKind::SearchTimeout => "SEARCH_TIMEOUT".to_string(),
            ErrorKind::SearchQueryFailed => "SEARCH_QUERY_FAILED".to_string(),
            ErrorKind::IndexNotFound => "INDEX_NOT_FOUND".to_string(),
            ErrorKind::ElasticsearchConnectionFailed => {
                "ELASTICSEARCH_CONNECTION_FAILED".to_string()
            }
            ErrorKind::ExecuteTimeout => "EXECUTE_TIMEOUT".to_string(),
            ErrorKind::TaskFailed => format!("{}_FAILED", task_type.to_uppercase()),
            ErrorKind::Unknown => "UNKNOWN_ERROR".to_string(),
        }
    }

    /// Default retryable flag for this kind, per the §7 taxonomy. Tasks that
    /// construct an `ErrorRecord` directly may still override it.
    pub fn default_retryable(self) -> bool {
        !matches!(
            self,
            ErrorKind::ParseError
                | ErrorKind::ValidationFailed
                | ErrorKind::TemplateNotFound
                | ErrorKind::TemplateValidationFailed
                | ErrorKind::ResponseRootNotObject
                | ErrorKind::RedisNotConfigured
                | ErrorKind::IndexNotFound
        )
    }

    /// The retry budget the source ES kinds carry on the wire (§7, §9). The
    /// runtime does not enforce this; it is metadata only.
    pub fn retry_budget(self) -> Option<u32> {
        match self {
            ErrorKind::SearchTimeout => Some(2),
            ErrorKind::SearchQueryFailed | ErrorKind::ElasticsearchConnectionFailed => Some(3),
            _ => None,
        }
    }
}

/// A structured error value carrying a tag, a human message, optional detail,
/// a retryable flag, and a UTC timestamp (§3).
#[derive(Debug, Clone, Error)]
#[error("{kind_label}: {message}")]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Cached label so `Display` doesn't need a `task_type` to render.
    kind_label: &'static str,
    pub message: String,
    pub detail: Option<String>,
    pub retryable: bool,
    pub timestamp: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let retryable = kind.default_retryable();
        Self {
            kind,
            kind_label: kind_label(kind),
            message: message.into(),
            detail: None,
            retryable,
            timestamp: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// `extractKind` helper (§4.2): the tag of a structured error, or
    /// [`ErrorKind::Unknown`] for anything that isn't already an
    /// `ErrorRecord`.
    pub fn extract_kind(err: &(dyn std::error::Error + 'static)) -> ErrorKind {
        err.downcast_ref::<ErrorRecord>()
            .map(|e| e.kind)
            .unwrap_or(ErrorKind::Unknown)
    }

    /// `convert` helper (§4.2): wrap a foreign error into an `ErrorRecord`
    /// with a task-supplied default kind/retryable, or return an existing
    /// `ErrorRecord` unchanged. Idempotent: `convert(convert(e)) == convert(e)`.
    pub fn convert(
        err: anyhow::Error,
        default_kind: ErrorKind,
        default_retryable: bool,
    ) -> ErrorRecord {
        match err.downcast::<ErrorRecord>() {
            Ok(already) => already,
            Err(err) => ErrorRecord {
                kind: default_kind,
                kind_label: kind_label(default_kind),
                message: err.to_string(),
                detail: Some(format!("{err:?}")),
                retryable: default_retryable,
                timestamp: Utc::now(),
            },
        }
    }
}

impl PartialEq for ErrorRecord {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message && self.retryable == other.retryable
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ParseError => "parse error",
        ErrorKind::ValidationFailed => "validation failed",
        ErrorKind::TemplateNotFound => "template not found",
        ErrorKind::TemplateValidationFailed => "template validation failed",
        ErrorKind::ResponseRootNotObject => "response root not object",
        ErrorKind::RedisNotConfigured => "fast store not configured",
        ErrorKind::SessionInvalidationError => "session invalidation error",
        ErrorKind::SmtpError => "smtp error",
        ErrorKind::SearchTimeout => "search timeout",
        ErrorKind::SearchQueryFailed => "search query failed",
        ErrorKind::IndexNotFound => "index not found",
        ErrorKind::ElasticsearchConnectionFailed => "elasticsearch connection failed",
        ErrorKind::ExecuteTimeout => "execute timeout",
        ErrorKind::TaskFailed => "task failed",
        ErrorKind::Unknown => "unknown error",
    }
}
