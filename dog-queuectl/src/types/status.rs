use serde::{Deserialize, Serialize};

use super::{JobState, Snapshot};

/// Queue-wide counts reported by `status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    /// Size of the dead-letter collection
    pub dead: usize,
    pub active_workers: usize,
}

impl QueueStatus {
    /// Count jobs per state. `active_workers` is filled in by the caller
    /// after stale records were purged.
    pub fn tally(snapshot: &Snapshot, active_workers: usize) -> Self {
        let mut status = Self {
            dead: snapshot.dead_letter.len(),
            active_workers,
            ..Self::default()
        };
        for job in &snapshot.jobs {
            match job.state {
                JobState::Pending => status.pending += 1,
                JobState::Processing => status.processing += 1,
                JobState::Completed => status.completed += 1,
                // Dead jobs never stay in the live collection
                JobState::Dead => status.dead += 1,
            }
        }
        status
    }

    /// Count for one state
    pub fn count(&self, state: JobState) -> usize {
        match state {
            JobState::Pending => self.pending,
            JobState::Processing => self.processing,
            JobState::Completed => self.completed,
            JobState::Dead => self.dead,
        }
    }

    /// Total number of jobs across both collections
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.dead
    }
}
