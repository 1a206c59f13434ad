use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tokio::signal;
use tracing::{info, warn};

/// Spawn `count` worker processes and supervise them until Ctrl-C.
///
/// Each child is told to stop by closing its stdin; children that are still
/// running after `grace` are killed.
pub(crate) async fn run(config: &Path, debug: bool, count: usize, grace: Duration) -> Result<()> {
    let exe = std::env::current_exe().context("locating queuectl executable")?;

    let mut children = Vec::with_capacity(count);
    for _ in 0..count {
        let mut cmd = Command::new(&exe);
        cmd.arg("--config").arg(config);
        if debug {
            cmd.arg("--debug");
        }
        cmd.args(["worker", "run", "--supervised"])
            .stdin(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().context("spawning worker process")?;
        info!(pid = ?child.id(), "worker process started");
        children.push(child);
    }

    println!("Started {count} worker(s). Press Ctrl-C to stop.");

    if let Err(error) = signal::ctrl_c().await {
        warn!(%error, "something strange with ctrl-c handling!");
    }
    println!("Graceful shutdown initiated, telling workers to stop...");

    for child in &mut children {
        // Closing stdin is the stop signal
        drop(child.stdin.take());
    }
    for child in children {
        stop(child, grace).await;
    }

    println!("All workers stopped.");
    Ok(())
}

async fn stop(mut child: Child, grace: Duration) {
    let pid = child.id();
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(?pid, %status, "worker process exited"),
        Ok(Err(error)) => warn!(?pid, %error, "failed to wait for worker process"),
        Err(_) => {
            warn!(?pid, "worker did not exit gracefully, terminating");
            println!("Worker {} did not exit gracefully, terminating...", pid.unwrap_or_default());
            if let Err(error) = child.kill().await {
                warn!(?pid, %error, "failed to kill worker process");
            }
        }
    }
}
