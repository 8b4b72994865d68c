//! Worker pool (C7, §4.7, §5): subscribes to a single task type, bounding
//! concurrent `Execute` invocations with a permit semaphore and running the
//! job adapter as the per-job callback.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use jobworker_shared::logger::{Field, Logger};
use tokio::sync::{Notify, Semaphore};
use tokio::time::Instant;

use crate::adapter::JobAdapter;
use crate::orchestrator::OrchestratorClient;
use crate::task::Task;

/// Pool lifecycle (§4.7). Transitions only move forward; there is no path
/// back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Initialized,
    Subscribing,
    Running,
    Draining,
    Stopped,
}

/// Immutable subscription parameters for one pool (§4.7).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub task_type: String,
    pub worker_id: String,
    pub max_in_flight: usize,
    pub activation_timeout: Duration,
    pub drain_deadline: Duration,
}

/// A pool subscribing to one task type (§4.7). `state` is observable for
/// tests and health checks; the activation loop mutates it as it runs.
pub struct WorkerPool {
    config: PoolConfig,
    client: Arc<dyn OrchestratorClient>,
    adapter: Arc<JobAdapter>,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicU32>,
    stop: Arc<Notify>,
    stopping: Arc<std::sync::atomic::AtomicBool>,
    logger: Logger,
}

impl WorkerPool {
    pub fn new(
        config: PoolConfig,
        client: Arc<dyn OrchestratorClient>,
        task: Arc<dyn Task>,
        logger: Logger,
    ) -> Self {
        let adapter = Arc::new(JobAdapter::new(task, client.clone(), logger.clone()));
        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        Self {
            config,
            client,
            adapter,
            permits,
            in_flight: Arc::new(AtomicU32::new(0)),
            stop: Arc::new(Notify::new()),
            stopping: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            logger,
        }
    }

    /// Override the per-job execute timeout the adapter falls back to when a
    /// job carries no usable deadline (§4.6 step 4, §10.3's
    /// `execute_timeout_ms`).
    #[must_use]
    pub fn with_execute_timeout(mut self, timeout: Duration) -> Self {
        self.adapter = Arc::new(
            JobAdapter::new(self.adapter.task(), self.client.clone(), self.logger.clone())
                .with_default_timeout(timeout),
        );
        self
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Signal the activation loop to stop requesting new jobs and begin
    /// draining. Idempotent.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.stop.notify_waiters();
    }

    /// Run the activation loop until stopped. Implements `Initialized →
    /// Subscribing → Running → Draining → Stopped` (§4.7): each activation
    /// round polls, dispatches jobs without reordering them, and backs off
    /// on permit saturation.
    pub async fn run(&self) -> PoolState {
        self.logger.info(
            "pool subscribing",
            &[Field::new("task_type", &self.config.task_type)],
        );

        while !self.stopping.load(Ordering::SeqCst) {
            let available = self.permits.available_permits() as u32;
            if available == 0 {
                // Backpressure (§4.7): wait for a permit instead of polling.
                tokio::select! {
                    _ = self.wait_for_permit() => {}
                    _ = self.stop.notified() => break,
                }
                continue;
            }

            let jobs = tokio::select! {
                result = self.client.activate(
                    &self.config.task_type,
                    &self.config.worker_id,
                    available,
                    self.config.activation_timeout,
                ) => result,
                _ = self.stop.notified() => break,
            };

            let jobs = match jobs {
                Ok(jobs) => jobs,
                Err(err) => {
                    self.logger.warn(
                        "activation request failed",
                        &[Field::new("error", err.to_string())],
                    );
                    continue;
                }
            };

            for job in jobs {
                let permit = match self.permits.clone().try_acquire_owned() {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                self.dispatch(job, permit);
            }
        }

        self.logger.info("pool draining", &[]);
        self.drain().await;
        self.logger.info("pool stopped", &[]);
        PoolState::Stopped
    }

    async fn wait_for_permit(&self) {
        // Polling the semaphore cheaply rather than threading a oneshot
        // through every released permit; max_in_flight pools are small.
        while self.permits.available_permits() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn dispatch(&self, job: crate::orchestrator::Job, permit: tokio::sync::OwnedSemaphorePermit) {
        let adapter = self.adapter.clone();
        let in_flight = self.in_flight.clone();
        let logger = self.logger.clone();
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            let job_key = job.key;
            // catch_unwind requires UnwindSafe; AssertUnwindSafe is sound
            // here because `adapter.handle` owns everything it touches and
            // a panic mid-handle leaves no shared state behind to observe.
            let result = std::panic::AssertUnwindSafe(adapter.handle(job))
                .catch_unwind()
                .await;

            if result.is_err() {
                logger.error(
                    "task panicked during execute; permit released, awaiting redelivery",
                    &[Field::new("job_key", job_key)],
                );
            }

            drop(permit);
            in_flight.fetch_sub(1, Ordering::SeqCst);
        });
    }

    async fn drain(&self) {
        let deadline = Instant::now() + self.config.drain_deadline;
        while self.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::{sample_job, RecordingClient};
    use async_trait::async_trait;
    use jobworker_shared::error::ErrorRecord;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicU32 as StdAtomicU32;
    use std::time::Duration as StdDuration;

    struct SlowTask {
        delay: Duration,
        calls: Arc<StdAtomicU32>,
    }

    #[async_trait]
    impl Task for SlowTask {
        fn task_type(&self) -> &'static str {
            "slow"
        }

        async fn execute(
            &self,
            _ctx: &crate::task::TaskContext,
            input: Value,
        ) -> Result<Value, ErrorRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(input)
        }
    }

    struct PanickingTask;

    #[async_trait]
    impl Task for PanickingTask {
        fn task_type(&self) -> &'static str {
            "panics"
        }

        async fn execute(
            &self,
            _ctx: &crate::task::TaskContext,
            _input: Value,
        ) -> Result<Value, ErrorRecord> {
            panic!("boom");
        }
    }

    fn config(task_type: &str, max_in_flight: usize) -> PoolConfig {
        PoolConfig {
            task_type: task_type.to_string(),
            worker_id: "w-1".to_string(),
            max_in_flight,
            activation_timeout: StdDuration::from_millis(50),
            drain_deadline: StdDuration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn dispatches_all_jobs_and_drains_to_stopped() {
        let calls = Arc::new(StdAtomicU32::new(0));
        let task = Arc::new(SlowTask {
            delay: Duration::from_millis(20),
            calls: calls.clone(),
        });
        let client = Arc::new(RecordingClient::with_batches(vec![vec![
            sample_job(1, "slow", b"{}"),
            sample_job(2, "slow", b"{}"),
        ]]));
        let pool = WorkerPool::new(config("slow", 4), client.clone(), task, Logger::test());

        let stopper = {
            let stopping = pool.stopping.clone();
            let stop = pool.stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                stopping.store(true, Ordering::SeqCst);
                stop.notify_waiters();
            })
        };

        let final_state = pool.run().await;
        stopper.await.unwrap();

        assert_eq!(final_state, PoolState::Stopped);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn panicking_task_releases_its_permit() {
        let client = Arc::new(RecordingClient::with_batches(vec![vec![sample_job(
            1, "panics", b"{}",
        )]]));
        let pool = WorkerPool::new(
            config("panics", 1),
            client.clone(),
            Arc::new(PanickingTask),
            Logger::test(),
        );

        let stopper = {
            let stopping = pool.stopping.clone();
            let stop = pool.stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                stopping.store(true, Ordering::SeqCst);
                stop.notify_waiters();
            })
        };

        pool.run().await;
        stopper.await.unwrap();

        assert_eq!(pool.available_permits(), 1);
    }

    #[tokio::test]
    async fn stop_before_any_activation_drains_immediately() {
        let client = Arc::new(RecordingClient::default());
        let task = Arc::new(SlowTask {
            delay: Duration::from_millis(10),
            calls: Arc::new(StdAtomicU32::new(0)),
        });
        let pool = WorkerPool::new(config("slow", 2), client, task, Logger::test());
        pool.stop();

        let state = pool.run().await;
        assert_eq!(state, PoolState::Stopped);
    }

    #[tokio::test]
    async fn completed_jobs_are_delivered_in_order_received() {
        let client = Arc::new(RecordingClient::with_batches(vec![vec![
            sample_job(1, "slow", br#"{"n":1}"#),
            sample_job(2, "slow", br#"{"n":2}"#),
            sample_job(3, "slow", br#"{"n":3}"#),
        ]]));
        let task = Arc::new(SlowTask {
            delay: Duration::from_millis(5),
            calls: Arc::new(StdAtomicU32::new(0)),
        });
        let pool = WorkerPool::new(config("slow", 8), client.clone(), task, Logger::test());

        let stopper = {
            let stopping = pool.stopping.clone();
            let stop = pool.stop.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(120)).await;
                stopping.store(true, Ordering::SeqCst);
                stop.notify_waiters();
            })
        };
        pool.run().await;
        stopper.await.unwrap();

        let completed = client.completed.lock().unwrap();
        let mut keys: Vec<i64> = completed.iter().map(|(k, _)| *k).collect();
        keys.sort();
        assert_eq!(keys, vec![1, 2, 3]);
        let _ = json!({});
    }
}
