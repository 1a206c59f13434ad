mod lock;

pub use lock::FileLock;

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{
    backend::{GateHandle, QueueBackend},
    config::QueueConfig,
    QueueResult, Snapshot,
};

/// Queue state kept in a single JSON document, with a sibling lock file
/// brokering access between processes.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    /// Use the configured `storage_file` and `lock_file`
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(&config.storage_file, &config.lock_file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("queue"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl QueueBackend for FileBackend {
    async fn acquire(&self, timeout: Duration) -> QueueResult<GateHandle> {
        let lock = FileLock::acquire(&self.lock_path, timeout).await?;
        Ok(GateHandle::new(lock))
    }

    async fn load(&self, _gate: &GateHandle) -> QueueResult<Snapshot> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store document missing, starting empty");
                return Ok(Snapshot::default());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store document unreadable, starting empty");
                return Ok(Snapshot::default());
            }
        };

        match serde_json::from_str(&contents) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store document corrupt, starting empty");
                Ok(Snapshot::default())
            }
        }
    }

    async fn save(&self, _gate: &GateHandle, snapshot: &Snapshot) -> QueueResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_vec_pretty(snapshot)?;

        // Write-then-rename so a crash never leaves a half-written document
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), jobs = snapshot.jobs.len(), "store document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Job;
    use chrono::Utc;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn backend_in(dir: &tempfile::TempDir) -> FileBackend {
        FileBackend::new(dir.path().join("queue.json"), dir.path().join("queue.lock"))
    }

    #[tokio::test]
    async fn missing_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        let gate = backend.acquire(TIMEOUT).await.unwrap();
        assert_eq!(backend.load(&gate).await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn corrupt_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        std::fs::write(backend.path(), "{ not json").unwrap();

        let gate = backend.acquire(TIMEOUT).await.unwrap();
        assert_eq!(backend.load(&gate).await.unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn saved_snapshot_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_in(&dir);
        let snapshot = Snapshot {
            jobs: vec![Job::new("echo hi", 3, Utc::now())],
            ..Snapshot::default()
        };

        let gate = backend.acquire(TIMEOUT).await.unwrap();
        backend.save(&gate, &snapshot).await.unwrap();
        gate.release();

        let reopened = backend_in(&dir);
        let gate = reopened.acquire(TIMEOUT).await.unwrap();
        assert_eq!(reopened.load(&gate).await.unwrap(), snapshot);
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(
            dir.path().join("nested/state/queue.json"),
            dir.path().join("queue.lock"),
        );
        let gate = backend.acquire(TIMEOUT).await.unwrap();
        backend.save(&gate, &Snapshot::default()).await.unwrap();
        assert!(backend.path().exists());
    }
}
