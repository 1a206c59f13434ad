//! # dog-queuectl: durable multi-process shell job queue
//!
//! Producers enqueue shell commands; independent worker processes lease them
//! one at a time, run them, and report the outcome:
//!
//! - **Lease exclusivity**: every store operation runs under a cross-process
//!   gate, so two workers never lease the same job
//! - **Retries with exponential backoff**: a failed job waits
//!   `backoff_base^attempts` seconds before it is eligible again
//! - **Dead-letter queue**: jobs that exhaust `max_retries` are parked for
//!   inspection and can be requeued with a fresh budget
//! - **Worker liveness**: heartbeats with lazy staleness expiry
//!
//! ```no_run
//! use dog_queuectl::prelude::*;
//!
//! # async fn demo() -> QueueResult<()> {
//! let config = QueueConfig::default();
//! let engine = QueueEngine::with_config(FileBackend::from_config(&config), (&config).into());
//!
//! let job_id = engine.enqueue("echo hello", None).await?;
//!
//! let worker = Worker::new(engine.clone(), ShellExecutor::from_config(&config), WorkerId::current())
//!     .with_config((&config).into())
//!     .spawn();
//!
//! // ... later
//! worker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod execution;
pub mod liveness;
pub mod retry;
pub mod transitions;
pub mod types;
pub mod worker;

pub use backend::{FileBackend, GateHandle, MemoryBackend, QueueBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::QueueConfig;
pub use engine::{EngineConfig, QueueEngine};
pub use error::{ConfigError, ExecutionFailure, QueueError, QueueResult};
pub use execution::{CommandExecutor, ShellExecutor};
pub use liveness::Heartbeat;
pub use retry::RetryPolicy;
pub use transitions::FailOutcome;
pub use types::{Job, JobId, JobState, QueueStatus, Snapshot, WorkerId, WorkerRecord};
pub use worker::{Worker, WorkerConfig, WorkerHandle};

/// Everything needed to enqueue jobs and run workers
pub mod prelude {
    pub use crate::{
        CommandExecutor, FileBackend, MemoryBackend, QueueBackend, QueueConfig, QueueEngine,
        ShellExecutor, Worker, WorkerHandle,
    };

    pub use crate::{
        FailOutcome, Job, JobId, JobState, QueueError, QueueResult, QueueStatus, WorkerId,
    };

    pub use async_trait::async_trait;
}
