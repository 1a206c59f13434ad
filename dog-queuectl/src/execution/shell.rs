use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::{config::QueueConfig, error::ExecutionFailure, execution::CommandExecutor};

/// Exit status POSIX shells use for "command not found"
const SHELL_NOT_FOUND: i32 = 127;

/// Runs commands through the platform shell with a wall-clock limit
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.job_timeout())
    }

    fn command(script: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(script);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(script);
            cmd
        }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    #[instrument(skip(self))]
    async fn execute(&self, command: &str) -> Result<(), ExecutionFailure> {
        let child = Self::command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ExecutionFailure::CommandNotFound,
                _ => ExecutionFailure::other(format!("failed to spawn shell: {e}")),
            })?;

        // Dropping the timed-out future drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecutionFailure::Timeout { after: self.timeout })?
            .map_err(|e| ExecutionFailure::other(format!("failed to wait for command: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(stdout = %stdout.trim_end(), "command output");
        }

        match output.status.code() {
            Some(0) => Ok(()),
            Some(SHELL_NOT_FOUND) if cfg!(not(windows)) => {
                warn!(stderr = %stderr.trim_end(), "command not found");
                Err(ExecutionFailure::CommandNotFound)
            }
            Some(code) => {
                warn!(code, stderr = %stderr.trim_end(), "command exited with failure");
                Err(ExecutionFailure::NonZeroExit { code })
            }
            None => Err(ExecutionFailure::other("command terminated by signal")),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn executor() -> ShellExecutor {
        ShellExecutor::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn successful_command() {
        assert_eq!(executor().execute("echo hi").await, Ok(()));
    }

    #[tokio::test]
    async fn non_zero_exit_reports_code() {
        assert_eq!(
            executor().execute("exit 3").await,
            Err(ExecutionFailure::NonZeroExit { code: 3 })
        );
    }

    #[tokio::test]
    async fn unknown_program_is_not_found() {
        assert_eq!(
            executor().execute("definitely-not-a-real-command-4821").await,
            Err(ExecutionFailure::CommandNotFound)
        );
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let executor = ShellExecutor::new(Duration::from_millis(100));
        assert_eq!(
            executor.execute("sleep 5").await,
            Err(ExecutionFailure::Timeout { after: Duration::from_millis(100) })
        );
    }
}
