pub mod shell;

use async_trait::async_trait;

use crate::error::ExecutionFailure;

pub use shell::ShellExecutor;

/// Runs a job's command. Any `Err` sends the job through the `fail`
/// transition; the worker loop itself keeps running.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<(), ExecutionFailure>;
}

#[async_trait]
impl<E: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<E> {
    async fn execute(&self, command: &str) -> Result<(), ExecutionFailure> {
        (**self).execute(command).await
    }
}
