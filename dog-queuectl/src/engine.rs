use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::{
    backend::QueueBackend,
    clock::{Clock, SystemClock},
    config::QueueConfig,
    dispatch,
    liveness::{self, Heartbeat},
    retry::RetryPolicy,
    transitions::{self, FailOutcome},
    Job, JobId, JobState, QueueResult, QueueStatus, Snapshot, WorkerId,
};

/// Settings the engine reads on every operation
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Gate acquisition timeout
    pub lock_timeout: Duration,
    /// Heartbeat age at which a worker stops counting as active
    pub worker_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for EngineConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(config),
            lock_timeout: config.lock_timeout(),
            worker_timeout: config.worker_timeout(),
        }
    }
}

/// Whether a critical section changed the snapshot
enum Txn<T> {
    Commit(T),
    ReadOnly(T),
}

/// Job store and dispatch engine.
///
/// Every operation runs as one critical section: acquire the gate, load the
/// snapshot, apply a transition, save if anything changed, release. Two
/// operations on the same store never interleave, whichever process runs
/// them.
pub struct QueueEngine<B: QueueBackend + ?Sized> {
    backend: Arc<B>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl<B: QueueBackend> QueueEngine<B> {
    /// Create an engine with default settings and the system clock
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    /// Create an engine with custom settings
    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            config,
            clock: Arc::new(SystemClock),
        }
    }
}

impl<B: QueueBackend + ?Sized> QueueEngine<B> {
    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get backend reference
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn transact<T, F>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&mut Snapshot, DateTime<Utc>) -> Txn<T>,
    {
        let gate = self.backend.acquire(self.config.lock_timeout).await?;
        let mut snapshot = self.backend.load(&gate).await?;
        let now = self.clock.now();

        let value = match f(&mut snapshot, now) {
            Txn::Commit(value) => {
                self.backend.save(&gate, &snapshot).await?;
                value
            }
            Txn::ReadOnly(value) => value,
        };
        gate.release();
        Ok(value)
    }

    /// Write an empty store if none exists, or replace a corrupt one
    pub async fn init(&self) -> QueueResult<()> {
        self.transact(|_, _| Txn::Commit(())).await
    }

    /// Enqueue a shell command. `max_retries` overrides the configured default.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, command: &str, max_retries: Option<u32>) -> QueueResult<JobId> {
        let max_retries = max_retries.unwrap_or(self.config.retry.default_max_retries);
        let job_id = self
            .transact(|snapshot, now| {
                Txn::Commit(transitions::enqueue(snapshot, command, max_retries, now))
            })
            .await?;

        info!(%job_id, max_retries, "job enqueued");
        Ok(job_id)
    }

    /// Lease the oldest eligible job. `None` means nothing is ready.
    #[instrument(skip(self))]
    pub async fn next_job_for_worker(&self) -> QueueResult<Option<Job>> {
        let leased = self
            .transact(|snapshot, now| match dispatch::lease_next(snapshot, now) {
                Some(job) => Txn::Commit(Some(job)),
                None => Txn::ReadOnly(None),
            })
            .await?;

        if let Some(job) = &leased {
            debug!(job_id = %job.id, attempts = job.attempts, "job leased");
        }
        Ok(leased)
    }

    /// Mark a leased job completed. Returns `false` if the job is gone or not
    /// `processing`.
    #[instrument(skip(self, id), fields(job_id = %id))]
    pub async fn complete(&self, id: &JobId) -> QueueResult<bool> {
        let found = self
            .transact(|snapshot, now| {
                if transitions::complete(snapshot, id, now) {
                    Txn::Commit(true)
                } else {
                    Txn::ReadOnly(false)
                }
            })
            .await?;

        if !found {
            debug!("completed job no longer leased");
        }
        Ok(found)
    }

    /// Record a failed execution: retry with backoff or move to the DLQ
    #[instrument(skip(self, id, reason), fields(job_id = %id))]
    pub async fn fail(&self, id: &JobId, reason: &str) -> QueueResult<FailOutcome> {
        let retry = self.config.retry;
        let outcome = self
            .transact(|snapshot, now| match transitions::fail(snapshot, id, reason, &retry, now) {
                FailOutcome::NotFound => Txn::ReadOnly(FailOutcome::NotFound),
                outcome => Txn::Commit(outcome),
            })
            .await?;

        match &outcome {
            FailOutcome::Retrying { attempts, run_at } => {
                warn!(attempts, %run_at, %reason, "job failed, will retry")
            }
            FailOutcome::Dead { attempts } => {
                warn!(attempts, %reason, "job failed permanently, moved to dead-letter queue")
            }
            FailOutcome::NotFound => debug!("failed job no longer leased"),
        }
        Ok(outcome)
    }

    /// Move a dead-lettered job back to pending. Returns `false` if the id
    /// is not in the dead-letter queue.
    #[instrument(skip(self, id), fields(job_id = %id))]
    pub async fn dlq_retry(&self, id: &JobId) -> QueueResult<bool> {
        let found = self
            .transact(|snapshot, now| {
                if transitions::dlq_retry(snapshot, id, now) {
                    Txn::Commit(true)
                } else {
                    Txn::ReadOnly(false)
                }
            })
            .await?;

        if found {
            info!("job requeued from dead-letter queue");
        }
        Ok(found)
    }

    /// Record a worker as alive
    #[instrument(skip(self))]
    pub async fn register_worker(&self, worker_id: WorkerId) -> QueueResult<()> {
        self.transact(|snapshot, now| {
            liveness::register(snapshot, worker_id, now);
            Txn::Commit(())
        })
        .await?;
        info!(%worker_id, "worker registered");
        Ok(())
    }

    /// Refresh a worker's heartbeat, re-registering it if its record is gone
    #[instrument(skip(self))]
    pub async fn heartbeat(&self, worker_id: WorkerId) -> QueueResult<Heartbeat> {
        let outcome = self
            .transact(|snapshot, now| Txn::Commit(liveness::heartbeat(snapshot, worker_id, now)))
            .await?;

        if outcome == Heartbeat::Reregistered {
            warn!(%worker_id, "heartbeat found no liveness record, worker re-registered");
        }
        Ok(outcome)
    }

    /// Remove a worker's liveness record
    #[instrument(skip(self))]
    pub async fn unregister_worker(&self, worker_id: WorkerId) -> QueueResult<()> {
        self.transact(|snapshot, _| {
            if liveness::unregister(snapshot, worker_id) {
                Txn::Commit(())
            } else {
                Txn::ReadOnly(())
            }
        })
        .await?;
        info!(%worker_id, "worker unregistered");
        Ok(())
    }

    /// Purge stale workers and count the remaining ones
    pub async fn active_count(&self) -> QueueResult<usize> {
        let timeout = self.config.worker_timeout;
        self.transact(|snapshot, now| {
            let purged = liveness::purge_stale(snapshot, timeout, now);
            let active = snapshot.workers.len();
            if purged > 0 {
                Txn::Commit(active)
            } else {
                Txn::ReadOnly(active)
            }
        })
        .await
    }

    /// Job counts per state, dead-letter size and active worker count
    pub async fn status(&self) -> QueueResult<QueueStatus> {
        let timeout = self.config.worker_timeout;
        self.transact(|snapshot, now| {
            let purged = liveness::purge_stale(snapshot, timeout, now);
            let status = QueueStatus::tally(snapshot, snapshot.workers.len());
            if purged > 0 {
                Txn::Commit(status)
            } else {
                Txn::ReadOnly(status)
            }
        })
        .await
    }

    /// Jobs in `state`; `Dead` lists the dead-letter queue
    pub async fn list(&self, state: JobState) -> QueueResult<Vec<Job>> {
        self.transact(|snapshot, _| {
            let jobs = match state {
                JobState::Dead => std::mem::take(&mut snapshot.dead_letter),
                state => snapshot.jobs.iter().filter(|j| j.state == state).cloned().collect(),
            };
            Txn::ReadOnly(jobs)
        })
        .await
    }

    /// Look a job up in either collection
    pub async fn get(&self, id: &JobId) -> QueueResult<Option<Job>> {
        self.transact(|snapshot, _| Txn::ReadOnly(snapshot.find(id).cloned()))
            .await
    }
}

impl<B: QueueBackend + ?Sized> Clone for QueueEngine<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
            clock: self.clock.clone(),
        }
    }
}
