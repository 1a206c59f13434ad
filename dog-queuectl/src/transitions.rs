//! Job state machine.
//!
//! ```text
//! enqueue ──► pending ──dispatch──► processing ──complete──► completed
//!                ▲                      │
//!                └──── fail (retry) ◄───┤
//!                                       └── fail (budget spent) ──► dead (DLQ)
//! dead ──dlq_retry──► pending (attempts = 0)
//! ```
//!
//! Each function mutates a snapshot the caller loaded under the queue lock.
//! Ids that are no longer present, or outcomes reported for a job that is not
//! `processing`, are reported as not found, never treated as errors.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::retry::RetryPolicy;
use crate::types::{Job, JobId, JobState, Snapshot};

/// Result of reporting a failed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FailOutcome {
    /// Back to pending, eligible again at `run_at`
    Retrying { attempts: u32, run_at: DateTime<Utc> },
    /// Retry budget exhausted; moved to the dead-letter collection
    Dead { attempts: u32 },
    /// The job is gone or no longer `processing`
    NotFound,
}

/// Append a new pending job
pub fn enqueue(
    snapshot: &mut Snapshot,
    command: &str,
    max_retries: u32,
    now: DateTime<Utc>,
) -> JobId {
    let job = Job::new(command, max_retries, now);
    let id = job.id.clone();
    snapshot.jobs.push(job);
    id
}

/// Mark a leased job completed. Returns whether a `processing` job with
/// this id was found.
pub fn complete(snapshot: &mut Snapshot, id: &JobId, now: DateTime<Utc>) -> bool {
    match leased_position(snapshot, id) {
        Some(index) => {
            snapshot.jobs[index].update_state(JobState::Completed, now);
            true
        }
        None => false,
    }
}

/// Record a failed attempt, scheduling a retry or dead-lettering the job
pub fn fail(
    snapshot: &mut Snapshot,
    id: &JobId,
    reason: &str,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> FailOutcome {
    let Some(index) = leased_position(snapshot, id) else {
        return FailOutcome::NotFound;
    };

    let job = &mut snapshot.jobs[index];
    job.attempts = job.attempts.saturating_add(1);
    job.last_error = Some(reason.to_string());

    if job.attempts >= job.max_retries {
        let mut dead = snapshot.jobs.remove(index);
        dead.update_state(JobState::Dead, now);
        let attempts = dead.attempts;
        snapshot.dead_letter.push(dead);
        return FailOutcome::Dead { attempts };
    }

    let run_at = now
        .checked_add_signed(policy.backoff_offset(job.attempts))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    job.run_at = run_at;
    job.update_state(JobState::Pending, now);
    FailOutcome::Retrying { attempts: job.attempts, run_at }
}

fn leased_position(snapshot: &Snapshot, id: &JobId) -> Option<usize> {
    snapshot
        .job_position(id)
        .filter(|&index| snapshot.jobs[index].state == JobState::Processing)
}

/// Move a dead-lettered job back to pending with a fresh budget.
/// Returns whether the id was in the dead-letter collection.
pub fn dlq_retry(snapshot: &mut Snapshot, id: &JobId, now: DateTime<Utc>) -> bool {
    let Some(index) = snapshot.dead_letter_position(id) else {
        return false;
    };
    let mut job = snapshot.dead_letter.remove(index);
    job.reset(now);
    snapshot.jobs.push(job);
    true
}
