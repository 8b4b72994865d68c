//! Job-dispatch and execution pipeline (§4.5-4.7): the task contract (C5),
//! the variables codec, the orchestrator client interface, the per-job
//! adapter (C6), and the bounded-concurrency worker pool (C7).

pub mod adapter;
pub mod orchestrator;
pub mod pool;
pub mod task;
pub mod variables;

pub use adapter::JobAdapter;
pub use orchestrator::{Ack, Job, OrchestratorClient};
pub use pool::{PoolConfig, PoolState, WorkerPool};
pub use task::{Task, TaskContext};
