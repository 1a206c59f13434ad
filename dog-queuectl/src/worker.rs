use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    backend::QueueBackend,
    config::QueueConfig,
    engine::QueueEngine,
    execution::CommandExecutor,
    transitions::FailOutcome,
    Job, QueueError, QueueResult, WorkerId,
};

/// Upper bound on the pause between writes retried through lock contention
const MAX_RETRY_PAUSE: Duration = Duration::from_millis(500);

/// Timing knobs for a worker loop
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Interval between liveness heartbeats
    pub heartbeat_interval: Duration,
    /// Idle wait when no job is eligible
    pub poll_interval: Duration,
    /// Upper bound of random jitter added to each idle wait
    pub poll_jitter: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for WorkerConfig {
    fn from(config: &QueueConfig) -> Self {
        let poll_interval = config.poll_interval();
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            poll_interval,
            poll_jitter: poll_interval / 10,
        }
    }
}

/// Handle for managing a spawned worker
pub struct WorkerHandle {
    cancel: CancellationToken,
    join_handle: JoinHandle<QueueResult<()>>,
}

impl WorkerHandle {
    /// Ask the worker to stop after its current iteration
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Gracefully shutdown the worker and wait for it to unregister
    pub async fn shutdown(self) -> QueueResult<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the worker to exit on its own
    pub async fn join(self) -> QueueResult<()> {
        self.join_handle
            .await
            .map_err(|e| QueueError::Internal(format!("Worker join error: {}", e)))?
    }
}

/// A single-threaded dispatch → execute → report loop.
///
/// Cancellation is cooperative: the token is checked between iterations and
/// raced against the idle wait, never against a running command or a store
/// operation.
pub struct Worker<B: QueueBackend + ?Sized, E> {
    engine: QueueEngine<B>,
    executor: E,
    worker_id: WorkerId,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl<B, E> Worker<B, E>
where
    B: QueueBackend + ?Sized + 'static,
    E: CommandExecutor + 'static,
{
    pub fn new(engine: QueueEngine<B>, executor: E, worker_id: WorkerId) -> Self {
        Self {
            engine,
            executor,
            worker_id,
            config: WorkerConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the loop on the tokio runtime
    pub fn spawn(self) -> WorkerHandle {
        let cancel = self.cancel.clone();
        let join_handle = tokio::spawn(self.run());
        WorkerHandle { cancel, join_handle }
    }

    /// Register, loop until cancelled, then unregister.
    ///
    /// Only cancellation or an unrecoverable store error ends the loop;
    /// failing commands never do.
    #[instrument(name = "worker", skip(self), fields(worker_id = %self.worker_id))]
    pub async fn run(self) -> QueueResult<()> {
        self.persist(|| self.engine.register_worker(self.worker_id)).await?;
        info!("worker started");

        let result = self.run_loop().await;
        if let Err(e) = &result {
            error!(error = %e, "worker loop stopped on store error");
        }

        if let Err(e) = self.engine.unregister_worker(self.worker_id).await {
            warn!(error = %e, "failed to unregister worker");
        }
        info!("worker stopped");
        result
    }

    async fn run_loop(&self) -> QueueResult<()> {
        let mut last_heartbeat = Instant::now();

        while !self.cancel.is_cancelled() {
            if last_heartbeat.elapsed() >= self.config.heartbeat_interval {
                match self.engine.heartbeat(self.worker_id).await {
                    Ok(_) => last_heartbeat = Instant::now(),
                    Err(e) if e.is_recoverable() => warn!(error = %e, "heartbeat skipped"),
                    Err(e) => return Err(e),
                }
            }

            match self.engine.next_job_for_worker().await {
                Ok(Some(job)) => self.process(job).await?,
                Ok(None) => self.idle().await,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "dispatch skipped");
                    self.idle().await;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Wait out the poll interval unless cancelled first
    async fn idle(&self) {
        let jitter_ms = self.config.poll_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        tokio::select! {
            _ = self.cancel.cancelled() => debug!("idle wait cancelled"),
            _ = tokio::time::sleep(self.config.poll_interval + jitter) => {}
        }
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn process(&self, job: Job) -> QueueResult<()> {
        info!(command = %job.command, attempts = job.attempts, "starting job");

        match self.executor.execute(&job.command).await {
            Ok(()) => {
                self.persist(|| self.engine.complete(&job.id)).await?;
                info!("job completed");
            }
            Err(failure) => {
                let reason = failure.to_string();
                let outcome = self.persist(|| self.engine.fail(&job.id, &reason)).await?;
                if let FailOutcome::Dead { attempts } = outcome {
                    error!(attempts, %reason, "job moved to dead-letter queue");
                }
            }
        }
        Ok(())
    }

    /// Retry a write through lock contention until it lands.
    ///
    /// Lock timeouts never drop the write; cancellation only shortens the
    /// pause between attempts.
    async fn persist<T, F, Fut>(&self, mut op: F) -> QueueResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = QueueResult<T>>,
    {
        let pause = self.config.poll_interval.min(MAX_RETRY_PAUSE);
        let mut attempt: u32 = 1;
        loop {
            match op().await {
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, attempt, "store write delayed by lock contention");
                    attempt = attempt.saturating_add(1);
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                result => return result,
            }
        }
    }
}
