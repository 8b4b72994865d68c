//! Job adapter (C6, §4.6): the fixed per-job sequence between a raw
//! orchestrator [`Job`] and a [`Task`]'s typed `execute`.

use std::sync::Arc;
use std::time::Duration;

use jobworker_shared::error::{ErrorKind, ErrorRecord};
use jobworker_shared::logger::{Field, Logger};
use serde_json::Value;

use crate::orchestrator::{Job, OrchestratorClient};
use crate::task::{Task, TaskContext};
use crate::variables;

/// Per-task default execution timeout (§4.6 step 4), used when a job carries
/// no usable deadline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the fixed per-job sequence described in §4.6 against one task
/// implementation.
pub struct JobAdapter {
    task: Arc<dyn Task>,
    client: Arc<dyn OrchestratorClient>,
    logger: Logger,
    default_timeout: Duration,
}

impl JobAdapter {
    pub fn new(task: Arc<dyn Task>, client: Arc<dyn OrchestratorClient>, logger: Logger) -> Self {
        Self {
            task,
            client,
            logger,
            default_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The task this adapter drives, for pools that need to rebuild an
    /// adapter with different settings (e.g. a configured execute timeout).
    pub fn task(&self) -> Arc<dyn Task> {
        self.task.clone()
    }

    /// Drive one job through decode → validate → execute → reply (§4.6
    /// steps 1-7). Never panics across this boundary: a panicking task is
    /// caught by the worker pool, not here.
    pub async fn handle(&self, job: Job) {
        let logger = self.logger.child([
            Field::new("task_type", &job.task_type),
            Field::new("job_key", job.key),
            Field::new("process_instance_key", job.process_instance_key),
        ]);

        let doc = match variables::decode_document(&job.variables) {
            Ok(doc) => doc,
            Err(err) => {
                self.throw(&job, &logger, err).await;
                return;
            }
        };

        if let Some(schema) = self.task.input_schema() {
            if let Err(violations) = jobworker_shared::schema::validate(schema, &doc) {
                let err = ErrorRecord::new(ErrorKind::ValidationFailed, violations.join("; "));
                self.throw(&job, &logger, err).await;
                return;
            }
        }

        let deadline = self.job_deadline();
        let ctx = TaskContext::new(job.key, deadline, logger.clone());

        // §4.5/§8: bound every task uniformly, not just the ones that
        // independently wrap their own I/O in a timeout. A task that never
        // yields past `ctx.deadline` is abandoned here rather than blocking
        // the job indefinitely.
        let outcome = match tokio::time::timeout(deadline, self.task.execute(&ctx, doc)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ErrorRecord::new(
                ErrorKind::ExecuteTimeout,
                "task execution exceeded the job deadline",
            )),
        };

        match outcome {
            Ok(output) => self.complete(&job, &logger, output).await,
            Err(err) => self.throw(&job, &logger, err).await,
        }
    }

    fn job_deadline(&self) -> Duration {
        self.default_timeout
    }

    async fn complete(&self, job: &Job, logger: &Logger, output: Value) {
        match self.client.complete_job(job.key, output).await {
            Ok(_) => {
                logger.info("job completed", &[]);
            }
            Err(err) => {
                // §4.6 step 6: transport failures on the reply are logged,
                // never turned into a second BPMN error for this job.
                logger.warn(
                    "failed to deliver completion; awaiting orchestrator redelivery",
                    &[Field::new("transport_error", err.to_string())],
                );
            }
        }
    }

    async fn throw(&self, job: &Job, logger: &Logger, err: ErrorRecord) {
        let code = err.kind.wire_code(&job.task_type);
        let err_logger = logger.with_error(&err);
        err_logger.error("job failed", &[]);

        if let Err(transport_err) = self.client.throw_error(job.key, &code, &err.message).await {
            logger.warn(
                "failed to deliver throw-error; awaiting orchestrator redelivery",
                &[Field::new("transport_error", transport_err.to_string())],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{sample_job, RecordingClient};
    use async_trait::async_trait;
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

    struct SchemaTask;

    #[async_trait]
    impl Task for SchemaTask {
        fn task_type(&self) -> &'static str {
            "schema_task"
        }

        fn input_schema(&self) -> Option<&Value> {
            static SCHEMA: std::sync::OnceLock<Value> = std::sync::OnceLock::new();
            Some(SCHEMA.get_or_init(|| json!({"required": ["a"]})))
        }

        async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
            Ok(input)
        }
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        fn task_type(&self) -> &'static str {
            "failing"
        }

        async fn execute(&self, _ctx: &TaskContext, _input: Value) -> Result<Value, ErrorRecord> {
            Err(ErrorRecord::new(ErrorKind::SmtpError, "dial failed"))
        }
    }

    struct SlowTask {
        delay: Duration,
    }

    #[async_trait]
    impl Task for SlowTask {
        fn task_type(&self) -> &'static str {
            "slow"
        }

        async fn execute(&self, _ctx: &TaskContext, input: Value) -> Result<Value, ErrorRecord> {
            tokio::time::sleep(self.delay).await;
            Ok(input)
        }
    }

    #[tokio::test]
    async fn decode_failure_throws_parse_error_without_invoking_task() {
        let client = Arc::new(RecordingClient::default());
        let adapter = JobAdapter::new(Arc::new(EchoTask), client.clone(), Logger::test());
        let job = sample_job(1, "echo", b"not json");

        adapter.handle(job).await;

        let thrown = client.thrown.lock().unwrap();
        assert_eq!(thrown.len(), 1);
        assert_eq!(thrown[0].1, "PARSE_ERROR");
    }

    #[tokio::test]
    async fn schema_violation_throws_validation_failed() {
        let client = Arc::new(RecordingClient::default());
        let adapter = JobAdapter::new(Arc::new(SchemaTask), client.clone(), Logger::test());
        let job = sample_job(1, "schema_task", b"{}");

        adapter.handle(job).await;

        let thrown = client.thrown.lock().unwrap();
        assert_eq!(thrown[0].1, "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn successful_execute_completes_the_job() {
        let client = Arc::new(RecordingClient::default());
        let adapter = JobAdapter::new(Arc::new(EchoTask), client.clone(), Logger::test());
        let job = sample_job(1, "echo", br#"{"a":1}"#);

        adapter.handle(job).await;

        let completed = client.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].1, json!({"a": 1}));
        assert!(client.thrown.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn task_failure_throws_mapped_wire_code() {
        let client = Arc::new(RecordingClient::default());
        let adapter = JobAdapter::new(Arc::new(FailingTask), client.clone(), Logger::test());
        let job = sample_job(1, "failing", b"{}");

        adapter.handle(job).await;

        let thrown = client.thrown.lock().unwrap();
        assert_eq!(thrown[0].1, "SMTP_ERROR");
        assert_eq!(thrown[0].2, "dial failed");
    }

    #[tokio::test]
    async fn context_cancellation_stops_execute_within_a_bounded_grace() {
        let client = Arc::new(RecordingClient::default());
        let task = Arc::new(SlowTask {
            delay: Duration::from_secs(5),
        });
        let adapter = JobAdapter::new(task, client.clone(), Logger::test())
            .with_default_timeout(Duration::from_millis(20));
        let job = sample_job(1, "slow", b"{}");

        let start = std::time::Instant::now();
        adapter.handle(job).await;
        let elapsed = start.elapsed();

        // The task sleeps for 5s; a bounded grace around tens of
        // milliseconds proves `execute` was abandoned rather than awaited
        // to completion.
        assert!(elapsed < Duration::from_secs(1));

        let thrown = client.thrown.lock().unwrap();
        assert_eq!(thrown[0].1, "EXECUTE_TIMEOUT");
        assert!(client.completed.lock().unwrap().is_empty());
    }
}
