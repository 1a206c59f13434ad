use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    backend::{GateHandle, QueueBackend},
    QueueError, QueueResult, Snapshot,
};

/// In-memory backend for testing and embedding.
///
/// The gate is an async mutex shared by clones, so clones behave like
/// separate processes pointed at the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    gate: Arc<tokio::sync::Mutex<()>>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::default())
    }

    /// Start from existing state
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            gate: Arc::new(tokio::sync::Mutex::new(())),
            snapshot: Arc::new(Mutex::new(snapshot)),
        }
    }

    /// Copy of the current state, bypassing the gate (test helper)
    pub fn peek(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    async fn acquire(&self, timeout: Duration) -> QueueResult<GateHandle> {
        let guard = tokio::time::timeout(timeout, self.gate.clone().lock_owned())
            .await
            .map_err(|_| QueueError::LockTimeout { timeout })?;
        Ok(GateHandle::new(guard))
    }

    async fn load(&self, _gate: &GateHandle) -> QueueResult<Snapshot> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, _gate: &GateHandle, snapshot: &Snapshot) -> QueueResult<()> {
        *self.snapshot.lock() = snapshot.clone();
        Ok(())
    }
}
