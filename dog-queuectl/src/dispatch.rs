//! Oldest-eligible-first job selection.
//!
//! Among pending jobs whose `run_at` has passed, the one created first wins;
//! equal `created_at` values fall back to id order so the choice is stable.
//! Early jobs are never starved by later ones whose backoff expired sooner.

use chrono::{DateTime, Utc};

use crate::types::{Job, JobState, Snapshot};

/// Index of the job the next worker should lease, if any
pub fn select_next(jobs: &[Job], now: DateTime<Utc>) -> Option<usize> {
    jobs.iter()
        .enumerate()
        .filter(|(_, job)| job.is_eligible(now))
        .min_by(|(_, a), (_, b)| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|(index, _)| index)
}

/// Lease the next eligible job: mark it `processing` and return a copy.
/// `None` means nothing is ready right now.
pub fn lease_next(snapshot: &mut Snapshot, now: DateTime<Utc>) -> Option<Job> {
    let index = select_next(&snapshot.jobs, now)?;
    let job = &mut snapshot.jobs[index];
    job.update_state(JobState::Processing, now);
    Some(job.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobId;
    use chrono::Duration;

    fn job_created_at(command: &str, created_at: DateTime<Utc>) -> Job {
        Job::new(command, 3, created_at)
    }

    #[test]
    fn picks_oldest_eligible() {
        let t0 = Utc::now();
        let jobs = vec![
            job_created_at("second", t0 + Duration::seconds(1)),
            job_created_at("first", t0),
            job_created_at("third", t0 + Duration::seconds(2)),
        ];
        let now = t0 + Duration::seconds(10);
        assert_eq!(select_next(&jobs, now), Some(1));
    }

    #[test]
    fn skips_jobs_still_backing_off() {
        let t0 = Utc::now();
        let mut backing_off = job_created_at("old", t0);
        backing_off.run_at = t0 + Duration::seconds(30);
        let jobs = vec![backing_off, job_created_at("new", t0 + Duration::seconds(1))];

        assert_eq!(select_next(&jobs, t0 + Duration::seconds(5)), Some(1));
        // Once the backoff expires the older job is preferred again
        assert_eq!(select_next(&jobs, t0 + Duration::seconds(30)), Some(0));
    }

    #[test]
    fn ties_break_by_id() {
        let t0 = Utc::now();
        let mut b = job_created_at("b", t0);
        b.id = JobId::from("b");
        let mut a = job_created_at("a", t0);
        a.id = JobId::from("a");
        assert_eq!(select_next(&[b, a], t0), Some(1));
    }

    #[test]
    fn lease_marks_processing() {
        let t0 = Utc::now();
        let mut snapshot = Snapshot {
            jobs: vec![job_created_at("echo hi", t0)],
            ..Snapshot::default()
        };
        let later = t0 + Duration::seconds(1);

        let leased = lease_next(&mut snapshot, later).unwrap();
        assert_eq!(leased.state, JobState::Processing);
        assert_eq!(leased.updated_at, later);
        assert_eq!(snapshot.jobs[0].state, JobState::Processing);

        assert!(lease_next(&mut snapshot, later).is_none());
    }

    #[test]
    fn empty_store_yields_none() {
        let mut snapshot = Snapshot::new();
        assert!(lease_next(&mut snapshot, Utc::now()).is_none());
    }
}
