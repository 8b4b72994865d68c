//! Task contract (C5, §4.5).
//!
//! A [`Task`] is the unit of work a worker pool dispatches jobs to. Tasks are
//! re-entrant (no per-job mutable state survives past `execute`), honor the
//! deadline carried in [`TaskContext`], and never panic across the boundary —
//! the job adapter treats a panic as an internal error, not a task failure.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use jobworker_shared::error::ErrorRecord;
use jobworker_shared::logger::Logger;

/// Per-job execution context handed to every task (§4.5, §4.6 step 3).
/// `deadline` is the time budget remaining for this job, derived from the
/// job's orchestrator deadline minus a safety margin, clamped to the
/// worker's configured default when the job carries none.
#[derive(Clone)]
pub struct TaskContext {
    pub job_key: i64,
    pub deadline: Duration,
    pub logger: Logger,
}

impl TaskContext {
    pub fn new(job_key: i64, deadline: Duration, logger: Logger) -> Self {
        Self {
            job_key,
            deadline,
            logger,
        }
    }
}

/// The contract every task catalog entry (C10) implements (§4.5).
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identifier the worker pool subscribes under and the job
    /// adapter uses to render `TaskFailed`'s wire code.
    fn task_type(&self) -> &'static str;

    /// Optional JSON schema the job adapter validates decoded input against
    /// before `execute` is called (§4.6 step 2). `None` skips validation.
    fn input_schema(&self) -> Option<&Value> {
        None
    }

    /// Run the task against already-decoded, already-validated input.
    /// Implementations must respect `ctx.deadline` where the underlying
    /// work supports cancellation (e.g. wrap I/O in `tokio::time::timeout`).
    async fn execute(&self, ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord>;

    /// Optional shallow connectivity probe used by readiness checks (§4.5).
    /// Tasks with no external dependency can leave this as a no-op success.
    async fn probe(&self) -> Result<(), ErrorRecord> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobworker_shared::error::ErrorKind;
    use serde_json::json;

    struct EchoTask;

    #[async_trait]
    impl Task for EchoTask {
        fn task_type(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
            Ok(input)
        }
    }

    struct FailingProbeTask;

    #[async_trait]
    impl Task for FailingProbeTask {
        fn task_type(&self) -> &'static str {
            "failing_probe"
        }

        async fn execute(&self, _ctx: &TaskContext, _input: Value) -> Result<Value, ErrorRecord> {
            Ok(Value::Null)
        }

        async fn probe(&self) -> Result<(), ErrorRecord> {
            Err(ErrorRecord::new(ErrorKind::Unknown, "dependency unreachable"))
        }
    }

    #[tokio::test]
    async fn default_probe_succeeds() {
        let task = EchoTask;
        assert!(task.probe().await.is_ok());
    }

    #[tokio::test]
    async fn execute_roundtrips_input() {
        let task = EchoTask;
        let ctx = TaskContext::new(1, Duration::from_secs(5), Logger::test());
        let result = task.execute(&ctx, json!({"a": 1})).await.unwrap();
        assert_eq!(result, json!({"a": 1}));
    }

    #[tokio::test]
    async fn overridden_probe_reports_failure() {
        let task = FailingProbeTask;
        assert!(task.probe().await.is_err());
    }

    #[test]
    fn default_input_schema_is_none() {
        let task = EchoTask;
        assert!(task.input_schema().is_none());
    }
}
