//! Orchestrator interface (§6): the streaming API the runtime consumes as a
//! client. `Job` mirrors the wire fields exactly; `OrchestratorClient` is the
//! trait the worker pool drives, so tests can swap in an in-memory fake
//! without a live orchestrator.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// A single unit of work delivered by the orchestrator (§3, §6). Immutable
/// once received; the runtime only ever produces a reply keyed by `key`.
#[derive(Debug, Clone)]
pub struct Job {
    pub key: i64,
    pub process_instance_key: i64,
    pub task_type: String,
    pub bpmn_process_id: String,
    pub process_definition_version: i32,
    pub process_definition_key: i64,
    pub element_id: String,
    pub element_instance_key: i64,
    pub custom_headers: String,
    pub worker: String,
    pub retries: i32,
    /// Epoch-millis deadline for this activation, as delivered on the wire.
    pub deadline: i64,
    /// The variables blob: a UTF-8 JSON document.
    pub variables: Vec<u8>,
}

/// Outcome of submitting a reply to the orchestrator. Transport failures are
/// distinguished from acks so the adapter can log-and-drop per §4.6 step 6
/// without throwing a second BPMN error for the same job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Acked,
}

/// The orchestrator's streaming API (§6), modeled as a client trait so the
/// worker pool and job adapter never depend on a concrete transport.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Long-poll for up to `max_jobs` activations of `task_type`, waiting at
    /// most `activation_timeout` for the orchestrator to respond.
    async fn activate(
        &self,
        task_type: &str,
        worker_id: &str,
        max_jobs: u32,
        activation_timeout: Duration,
    ) -> Result<Vec<Job>, anyhow::Error>;

    /// Complete `job_key` with `variables` as the next step's workflow
    /// variables.
    async fn complete_job(&self, job_key: i64, variables: Value) -> Result<Ack, anyhow::Error>;

    /// Throw a BPMN error on `job_key` carrying a stable `error_code` and a
    /// human `error_message`.
    async fn throw_error(
        &self,
        job_key: i64,
        error_code: &str,
        error_message: &str,
    ) -> Result<Ack, anyhow::Error>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every call made against it; activations are served from a
    /// pre-seeded queue, one batch per call.
    #[derive(Default)]
    pub struct RecordingClient {
        pub activation_batches: Mutex<Vec<Vec<Job>>>,
        pub completed: Mutex<Vec<(i64, Value)>>,
        pub thrown: Mutex<Vec<(i64, String, String)>>,
    }

    impl RecordingClient {
        pub fn with_batches(batches: Vec<Vec<Job>>) -> Self {
            Self {
                activation_batches: Mutex::new(batches),
                completed: Mutex::new(Vec::new()),
                thrown: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl OrchestratorClient for RecordingClient {
        async fn activate(
            &self,
            _task_type: &str,
            _worker_id: &str,
            _max_jobs: u32,
            _activation_timeout: Duration,
        ) -> Result<Vec<Job>, anyhow::Error> {
            let mut batches = self.activation_batches.lock().unwrap();
            Ok(if batches.is_empty() {
                Vec::new()
            } else {
                batches.remove(0)
            })
        }

        async fn complete_job(&self, job_key: i64, variables: Value) -> Result<Ack, anyhow::Error> {
            self.completed.lock().unwrap().push((job_key, variables));
            Ok(Ack::Acked)
        }

        async fn throw_error(
            &self,
            job_key: i64,
            error_code: &str,
            error_message: &str,
        ) -> Result<Ack, anyhow::Error> {
            self.thrown
                .lock()
                .unwrap()
                .push((job_key, error_code.to_string(), error_message.to_string()));
            Ok(Ack::Acked)
        }
    }

    pub fn sample_job(key: i64, task_type: &str, variables: &[u8]) -> Job {
        Job {
            key,
            process_instance_key: 100 + key,
            task_type: task_type.to_string(),
            bpmn_process_id: "demo-process".to_string(),
            process_definition_version: 1,
            process_definition_key: 1,
            element_id: "element".to_string(),
            element_instance_key: key,
            custom_headers: String::new(),
            worker: "worker-1".to_string(),
            retries: 3,
            deadline: 0,
            variables: variables.to_vec(),
        }
    }
}
