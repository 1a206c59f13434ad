use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::JobId;

/// Job state lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting for `run_at` to pass and a worker to lease it
    Pending,

    /// Leased by exactly one worker
    Processing,

    /// Finished successfully
    Completed,

    /// Retry budget exhausted; lives in the dead-letter collection
    Dead,
}

impl JobState {
    /// Every state, in display order
    pub const ALL: [JobState; 4] = [Self::Pending, Self::Processing, Self::Completed, Self::Dead];

    /// Get the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Dead => "dead",
        }
    }

    /// Whether the job can still be leased or is currently leased
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.name() == s)
            .ok_or_else(|| {
                format!("invalid state `{s}`, must be one of: pending, processing, completed, dead")
            })
    }
}

/// A shell-command job as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Shell command to execute
    pub command: String,

    /// Current job state
    pub state: JobState,

    /// Number of failed execution attempts
    pub attempts: u32,

    /// Failure budget, fixed at enqueue time
    pub max_retries: u32,

    /// Earliest time the job may be dispatched
    pub run_at: DateTime<Utc>,

    /// When the job was enqueued
    pub created_at: DateTime<Utc>,

    /// Bumped on every state change
    pub updated_at: DateTime<Utc>,

    /// Most recent failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Job {
    /// Create a pending job that is immediately eligible
    pub fn new(command: impl Into<String>, max_retries: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: JobId::new(),
            command: command.into(),
            state: JobState::Pending,
            attempts: 0,
            max_retries,
            run_at: now,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }

    /// Check if the job may be leased at `now`
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.run_at <= now
    }

    /// Update the job state and timestamp
    pub fn update_state(&mut self, state: JobState, now: DateTime<Utc>) {
        self.state = state;
        self.updated_at = now;
    }

    /// Put the job back in line at `now` with a fresh budget and no
    /// recorded failure
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.attempts = 0;
        self.last_error = None;
        self.run_at = now;
        self.update_state(JobState::Pending, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_names() {
        for state in JobState::ALL {
            assert_eq!(state.name().parse::<JobState>().unwrap(), state);
        }
        assert!("buried".parse::<JobState>().is_err());
    }

    #[test]
    fn state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobState::Processing).unwrap(), "\"processing\"");
    }

    #[test]
    fn eligibility_requires_pending_and_due() {
        let now = Utc::now();
        let mut job = Job::new("echo hi", 3, now);
        assert!(job.is_eligible(now));

        job.run_at = now + chrono::Duration::seconds(5);
        assert!(!job.is_eligible(now));

        job.run_at = now;
        job.update_state(JobState::Processing, now);
        assert!(!job.is_eligible(now));
    }

    #[test]
    fn reset_clears_budget_and_error() {
        let t0 = Utc::now();
        let mut job = Job::new("false", 2, t0);
        job.attempts = 2;
        job.last_error = Some("exited with code 1".into());
        job.update_state(JobState::Dead, t0);

        let t1 = t0 + chrono::Duration::minutes(1);
        job.reset(t1);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.last_error, None);
        assert!(job.is_eligible(t1));
    }

    #[test]
    fn missing_last_error_deserializes() {
        let now = Utc::now();
        let mut value = serde_json::to_value(Job::new("true", 1, now)).unwrap();
        value.as_object_mut().unwrap().remove("last_error");
        let job: Job = serde_json::from_value(value).unwrap();
        assert_eq!(job.last_error, None);
    }
}
