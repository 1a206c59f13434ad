use std::collections::HashSet;
use std::time::Duration;

use tempfile::TempDir;

use dog_queuectl::{
    EngineConfig, FailOutcome, FileBackend, JobState, QueueBackend, QueueConfig, QueueEngine,
    Snapshot,
};

/// Test factory functions
fn create_test_config(dir: &TempDir) -> QueueConfig {
    QueueConfig {
        storage_file: dir.path().join("queue.json"),
        lock_file: dir.path().join("queue.lock"),
        ..QueueConfig::default()
    }
}

fn create_test_engine(config: &QueueConfig) -> QueueEngine<FileBackend> {
    QueueEngine::with_config(FileBackend::from_config(config), config.into())
}

async fn read_snapshot(config: &QueueConfig) -> Snapshot {
    let contents = tokio::fs::read_to_string(&config.storage_file).await.unwrap();
    serde_json::from_str(&contents).unwrap()
}

/// F1. State survives across engine instances
#[tokio::test]
async fn test_state_persists_between_engines() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);

    let job_id = create_test_engine(&config).enqueue("echo hi", Some(5)).await.unwrap();

    // A fresh engine, as a separate process would build it
    let engine = create_test_engine(&config);
    let job = engine.get(&job_id).await.unwrap().unwrap();
    assert_eq!(job.command, "echo hi");
    assert_eq!(job.max_retries, 5);

    let leased = engine.next_job_for_worker().await.unwrap().unwrap();
    assert_eq!(leased.id, job_id);

    let on_disk = read_snapshot(&config).await;
    assert_eq!(on_disk.jobs[0].state, JobState::Processing);
}

/// F2. The document is plain JSON with the expected collections
#[tokio::test]
async fn test_document_layout() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let engine = create_test_engine(&config);

    let job_id = engine.enqueue("exit 1", Some(1)).await.unwrap();
    engine.next_job_for_worker().await.unwrap().unwrap();
    let outcome = engine.fail(&job_id, "exited with code 1").await.unwrap();
    assert_eq!(outcome, FailOutcome::Dead { attempts: 1 });

    let contents = tokio::fs::read_to_string(&config.storage_file).await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(value["jobs"].as_array().unwrap().len(), 0);
    assert_eq!(value["dead_letter"][0]["id"], job_id.as_str());
    assert_eq!(value["dead_letter"][0]["state"], "dead");
    assert_eq!(value["dead_letter"][0]["last_error"], "exited with code 1");
    assert!(value["workers"].as_array().unwrap().is_empty());

    // No temp file left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

/// F3. A corrupt document is treated as empty and overwritten on the next write
#[tokio::test]
async fn test_corrupt_document_recovers_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    tokio::fs::write(&config.storage_file, b"{\"jobs\": [ truncated").await.unwrap();

    let engine = create_test_engine(&config);
    assert_eq!(engine.status().await.unwrap().total(), 0);

    engine.enqueue("echo fresh", None).await.unwrap();
    let on_disk = read_snapshot(&config).await;
    assert_eq!(on_disk.jobs.len(), 1);
}

/// F4. Init creates an empty document only when needed
#[tokio::test]
async fn test_init_writes_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let engine = create_test_engine(&config);

    engine.init().await.unwrap();
    assert_eq!(read_snapshot(&config).await, Snapshot::default());

    let job_id = engine.enqueue("echo hi", None).await.unwrap();
    engine.init().await.unwrap();
    assert!(read_snapshot(&config).await.find(&job_id).is_some());
}

/// G1. A held lock times out other operations without touching state
#[tokio::test]
async fn test_lock_timeout_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);
    let engine = create_test_engine(&config);
    engine.enqueue("echo first", None).await.unwrap();
    let before = read_snapshot(&config).await;

    let impatient = QueueEngine::with_config(
        FileBackend::from_config(&config),
        EngineConfig {
            lock_timeout: Duration::from_millis(50),
            ..EngineConfig::from(&config)
        },
    );

    let held = impatient.backend().acquire(Duration::from_secs(1)).await.unwrap();
    let err = impatient.enqueue("echo second", None).await.unwrap_err();
    assert!(err.is_recoverable());
    assert!(impatient.next_job_for_worker().await.unwrap_err().is_recoverable());
    held.release();

    assert_eq!(read_snapshot(&config).await, before);
    assert_eq!(impatient.status().await.unwrap().pending, 1);
}

/// G2. Separate backends on one file never lease the same job twice
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch_across_backends() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&dir);

    let producer = create_test_engine(&config);
    for n in 0..30 {
        producer.enqueue(&format!("echo {n}"), None).await.unwrap();
    }

    let mut tasks = Vec::new();
    for _ in 0..4 {
        // Each task owns its own backend, like a separate worker process
        let engine = create_test_engine(&config);
        tasks.push(tokio::spawn(async move {
            let mut leased = Vec::new();
            while let Some(job) = engine.next_job_for_worker().await.unwrap() {
                leased.push(job.id.clone());
                assert!(engine.complete(&job.id).await.unwrap());
            }
            leased
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }
    let unique: HashSet<_> = all.iter().cloned().collect();
    assert_eq!(all.len(), 30);
    assert_eq!(unique.len(), 30);

    let on_disk = read_snapshot(&config).await;
    assert!(on_disk.jobs.iter().all(|job| job.state == JobState::Completed));
}

/// G3. Store and lock may live in directories that do not exist yet
#[tokio::test]
async fn test_nested_paths_are_created() {
    let dir = tempfile::tempdir().unwrap();
    let config = QueueConfig {
        storage_file: dir.path().join("data").join("queue.json"),
        lock_file: dir.path().join("run").join("queue.lock"),
        ..QueueConfig::default()
    };
    let engine = create_test_engine(&config);

    let job_id = engine.enqueue("echo nested", None).await.unwrap();
    assert!(config.lock_file.exists());
    assert!(read_snapshot(&config).await.find(&job_id).is_some());
}
