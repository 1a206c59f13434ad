//! Worker liveness records.
//!
//! Staleness is detected lazily: readers purge records whose heartbeat is
//! at least `worker_timeout` old before counting. There is no sweeper.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::{Snapshot, WorkerId, WorkerRecord};

/// What a heartbeat did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    /// The existing record was refreshed
    Refreshed,
    /// No record existed (purged as stale, or the store was reset), so the
    /// worker was registered again
    Reregistered,
}

/// Insert a fresh record, replacing any previous one for the same id
pub fn register(snapshot: &mut Snapshot, worker_id: WorkerId, now: DateTime<Utc>) {
    unregister(snapshot, worker_id);
    snapshot.workers.push(WorkerRecord { worker_id, last_heartbeat: now });
}

/// Remove the record for `worker_id`. Returns whether one existed.
pub fn unregister(snapshot: &mut Snapshot, worker_id: WorkerId) -> bool {
    let before = snapshot.workers.len();
    snapshot.workers.retain(|w| w.worker_id != worker_id);
    snapshot.workers.len() != before
}

/// Refresh `last_heartbeat`, registering the worker if its record is gone
pub fn heartbeat(snapshot: &mut Snapshot, worker_id: WorkerId, now: DateTime<Utc>) -> Heartbeat {
    match snapshot.worker_mut(worker_id) {
        Some(record) => {
            record.last_heartbeat = now;
            Heartbeat::Refreshed
        }
        None => {
            register(snapshot, worker_id, now);
            Heartbeat::Reregistered
        }
    }
}

/// Drop records with `now - last_heartbeat >= timeout`. Returns how many
/// were removed.
pub fn purge_stale(snapshot: &mut Snapshot, timeout: Duration, now: DateTime<Utc>) -> usize {
    let timeout = chrono::Duration::milliseconds(timeout.as_millis().min(i64::MAX as u128) as i64);
    let before = snapshot.workers.len();
    snapshot
        .workers
        .retain(|w| now.signed_duration_since(w.last_heartbeat) < timeout);
    before - snapshot.workers.len()
}
