use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::{QueueError, QueueResult};

const MIN_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(100);

/// An exclusive advisory lock on a file, shared with every process that
/// opens the same path. Released on drop (and by the OS if the process dies).
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Poll for the lock until `timeout` elapses
    pub async fn acquire(path: &Path, timeout: Duration) -> QueueResult<Self> {
        let file = open_lock_file(path.to_path_buf()).await?;

        let deadline = Instant::now() + timeout;
        let mut poll = MIN_POLL;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => return Ok(Self { file }),
                Err(e) if is_contended(&e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(QueueError::LockTimeout { timeout });
                    }
                    trace!(path = %path.display(), "queue lock busy, waiting");
                    sleep(poll.min(deadline - now)).await;
                    poll = (poll * 2).min(MAX_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Closing the file releases it as well
        let _ = FileExt::unlock(&self.file);
    }
}

/// Open (creating it and its directory if needed) off the async runtime
async fn open_lock_file(path: PathBuf) -> io::Result<File> {
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
