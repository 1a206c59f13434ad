use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dog_queuectl::config::DEFAULT_CONFIG_FILE;
use dog_queuectl::JobState;

#[derive(Parser, Debug)]
#[command(about = "A CLI-based background job queue", long_about = None, version)]
pub(crate) struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, global = true, env = "QUEUECTL_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub(crate) config: PathBuf,
    /// Enables human-friendly logging.
    #[arg(short, long, global = true, default_value_t)]
    pub(crate) debug: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Add a shell command to the queue.
    Enqueue {
        /// The shell command to execute.
        command: String,
        /// Override max retries for this job.
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Show job counts per state and active workers.
    Status,
    /// List jobs in one state.
    List {
        /// pending, processing, completed or dead.
        #[arg(long, default_value = "pending")]
        state: JobState,
    },
    /// Manage worker processes.
    #[command(subcommand)]
    Worker(WorkerCommand),
    /// Manage configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage the dead-letter queue.
    #[command(subcommand)]
    Dlq(DlqCommand),
}

#[derive(Subcommand, Debug)]
pub(crate) enum WorkerCommand {
    /// Start worker processes and supervise them until Ctrl-C.
    Start {
        /// Number of worker processes to start.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Run a single worker in this process.
    #[command(hide = true)]
    Run {
        /// Stop when stdin closes (set by `worker start`).
        #[arg(long, hide = true)]
        supervised: bool,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum ConfigCommand {
    /// Print the effective configuration.
    Show,
    /// Update one configuration key.
    Set {
        /// e.g. max_retries or backoff_base.
        key: String,
        /// The new value.
        value: String,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum DlqCommand {
    /// List jobs in the dead-letter queue.
    List,
    /// Move a job from the dead-letter queue back to pending.
    Retry {
        /// The id of the job to retry.
        job_id: String,
    },
}
