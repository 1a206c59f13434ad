mod args;
mod render;
mod supervisor;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use dog_queuectl::{
    FileBackend, JobId, JobState, QueueConfig, QueueEngine, ShellExecutor, Worker, WorkerId,
};
use tokio::io::AsyncReadExt;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command, ConfigCommand, DlqCommand, WorkerCommand};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logging goes to stderr so command output stays clean
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.debug { "debug" } else { "info" })
    });
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match begin(args).await {
        Ok(code) => code,
        Err(error) => {
            error!(error = %format!("{error:#}"), "command failed");
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn begin(args: Args) -> Result<ExitCode> {
    let config = QueueConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let engine = QueueEngine::with_config(FileBackend::from_config(&config), (&config).into());

    match args.command {
        Command::Enqueue { command, max_retries } => {
            let job_id = engine.enqueue(&command, max_retries).await?;
            println!("Job enqueued with ID: {job_id}");
        }
        Command::Status => {
            let status = engine.status().await?;
            print!("{}", render::status_table(&status));
        }
        Command::List { state } => list(&engine, state).await?,
        Command::Worker(WorkerCommand::Start { count }) => {
            engine.init().await?;
            supervisor::run(&args.config, args.debug, count, config.shutdown_grace()).await?;
        }
        Command::Worker(WorkerCommand::Run { supervised }) => {
            run_worker(engine, &config, supervised).await?;
        }
        Command::Config(ConfigCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Config(ConfigCommand::Set { key, value }) => {
            return set_config(&args.config, config, &key, &value);
        }
        Command::Dlq(DlqCommand::List) => list(&engine, JobState::Dead).await?,
        Command::Dlq(DlqCommand::Retry { job_id }) => {
            let job_id = JobId::from(job_id);
            if engine.dlq_retry(&job_id).await? {
                println!("Job {job_id} moved from DLQ to pending queue.");
            } else {
                eprintln!("Error: job {job_id} not found in DLQ.");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn list(engine: &QueueEngine<FileBackend>, state: JobState) -> Result<()> {
    let jobs = engine.list(state).await?;
    print!("{}", render::job_table(state, &jobs));
    Ok(())
}

fn set_config(path: &Path, mut config: QueueConfig, key: &str, value: &str) -> Result<ExitCode> {
    if let Err(error) = config.set(key, value) {
        eprintln!("Error: {error}");
        eprintln!("Available keys: {}", QueueConfig::keys().join(", "));
        return Ok(ExitCode::FAILURE);
    }
    config
        .save(path)
        .with_context(|| format!("saving config to {}", path.display()))?;
    println!("Config updated: {key} = {value}");
    Ok(ExitCode::SUCCESS)
}

async fn run_worker(
    engine: QueueEngine<FileBackend>,
    config: &QueueConfig,
    supervised: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(error) = signal::ctrl_c().await {
                warn!(%error, "something strange with ctrl-c handling!");
            }
            cancel.cancel();
        });
    }
    if supervised {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            // The supervisor never writes; EOF means "stop"
            let mut sink = Vec::new();
            let _ = tokio::io::stdin().read_to_end(&mut sink).await;
            debug!("stdin closed by supervisor");
            cancel.cancel();
        });
    }

    Worker::new(engine, ShellExecutor::from_config(config), WorkerId::current())
        .with_config(config.into())
        .with_cancellation(cancel)
        .run()
        .await?;
    Ok(())
}
