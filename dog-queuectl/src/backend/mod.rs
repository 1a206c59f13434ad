pub mod file;
pub mod memory;

use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::time::Duration;

use crate::{QueueResult, Snapshot};

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Proof that the caller holds the queue's mutual-exclusion gate.
///
/// The gate is released when the handle is dropped, so every exit path of
/// an operation (including `?` returns) gives it back.
#[must_use = "the gate is released as soon as the handle is dropped"]
pub struct GateHandle {
    _guard: Box<dyn Any + Send + Sync>,
}

impl GateHandle {
    /// Wrap whatever keeps the underlying lock held
    pub fn new(guard: impl Send + Sync + 'static) -> Self {
        Self { _guard: Box::new(guard) }
    }

    /// Release the gate explicitly
    pub fn release(self) {}
}

impl fmt::Debug for GateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateHandle").finish_non_exhaustive()
    }
}

/// Durable store for queue snapshots, guarded by a cross-process gate.
///
/// `load` and `save` work on the whole snapshot and require a live
/// [`GateHandle`], so a read-modify-write can only happen inside one
/// critical section.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Acquire the gate, waiting at most `timeout`.
    /// Fails with [`QueueError::LockTimeout`](crate::QueueError::LockTimeout).
    async fn acquire(&self, timeout: Duration) -> QueueResult<GateHandle>;

    /// Read the persisted snapshot. A missing or corrupt document yields an
    /// empty snapshot.
    async fn load(&self, gate: &GateHandle) -> QueueResult<Snapshot>;

    /// Replace the persisted snapshot
    async fn save(&self, gate: &GateHandle, snapshot: &Snapshot) -> QueueResult<()>;
}
