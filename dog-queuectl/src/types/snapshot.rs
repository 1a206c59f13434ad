use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Job, JobId, WorkerId};

/// A worker's self-reported liveness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    pub last_heartbeat: DateTime<Utc>,
}

/// The whole persisted state of a queue.
///
/// Every id lives in exactly one of `jobs` and `dead_letter`. Worker records
/// are unique by `worker_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default)]
    pub dead_letter: Vec<Job>,

    #[serde(default)]
    pub workers: Vec<WorkerRecord>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn job_position(&self, id: &JobId) -> Option<usize> {
        self.jobs.iter().position(|job| &job.id == id)
    }

    pub(crate) fn dead_letter_position(&self, id: &JobId) -> Option<usize> {
        self.dead_letter.iter().position(|job| &job.id == id)
    }

    /// Find a job in either collection
    pub fn find(&self, id: &JobId) -> Option<&Job> {
        self.jobs
            .iter()
            .chain(self.dead_letter.iter())
            .find(|job| &job.id == id)
    }

    pub(crate) fn worker_mut(&mut self, worker_id: WorkerId) -> Option<&mut WorkerRecord> {
        self.workers.iter_mut().find(|w| w.worker_id == worker_id)
    }
}
