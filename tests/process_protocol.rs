//! Exchange artifact protocol and the subprocess execution backend.

use std::error::Error;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use fragdag::exec::exchange::{read_request, read_response, write_request, write_response};
use fragdag::{
    run_worker, ExchangeError, ExchangeRequest, ExchangeResponse, FragmentData, ProcessWorker,
    ResultRecord, RunningStatus, TaskContext, TaskEnv, TaskOutput, TaskRegistry, TestStatus,
    Worker, WorkerCommand,
};
use serde_json::json;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn plain_status() -> Arc<RunningStatus> {
    Arc::new(RunningStatus::new(None, Duration::ZERO, 0))
}

async fn wait_done(worker: &mut ProcessWorker) {
    while worker.is_running() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn dir_is_empty(dir: &TempDir) -> std::io::Result<bool> {
    Ok(fs::read_dir(dir.path())?.next().is_none())
}

#[test]
fn request_survives_a_write_read_cycle() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("req.json");

    let mut env = TaskEnv::new();
    env.insert("suite".to_string(), json!("smoke"));
    env.insert("timeout".to_string(), json!(30));
    let request = ExchangeRequest::new("t1.run", 4, "run_test", env, 2);

    write_request(&path, &request)?;
    let read_back = read_request(&path)?;
    assert_eq!(read_back, request);
    Ok(())
}

#[test]
fn response_survives_a_write_read_cycle() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("resp.json");

    let response = ExchangeResponse::new(vec![
        ResultRecord::new("t1.run", TestStatus::Pass),
        ResultRecord::new("t1.run.cleanup", TestStatus::XFail).with_message("known issue"),
    ]);

    write_response(&path, &response)?;
    let read_back = read_response(&path)?;
    assert_eq!(read_back, response);
    Ok(())
}

#[test]
fn stale_version_is_rejected() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("req.json");

    let mut request = ExchangeRequest::new("t1.run", 1, "run_test", TaskEnv::new(), 0);
    request.version = 99;
    write_request(&path, &request)?;

    match read_request(&path) {
        Err(ExchangeError::VersionMismatch { found, expected, .. }) => {
            assert_eq!(found, 99);
            assert_ne!(found, expected);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[test]
fn a_response_is_not_a_request() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("artifact.json");

    write_response(&path, &ExchangeResponse::new(vec![]))?;

    assert!(matches!(
        read_request(&path),
        Err(ExchangeError::UnexpectedShape { .. })
    ));
    Ok(())
}

#[test]
fn garbage_artifact_is_a_decode_error() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("artifact.json");
    fs::write(&path, "not json at all")?;

    assert!(matches!(
        read_response(&path),
        Err(ExchangeError::Decode { .. })
    ));
    Ok(())
}

fn env_echo_body(ctx: &TaskContext<'_>) -> TaskOutput {
    let suite = ctx.env.get("suite").and_then(|v| v.as_str()).unwrap_or("?");
    TaskOutput::new(vec![ResultRecord::new(
        format!("{}.{suite}", ctx.uid),
        TestStatus::Pass,
    )])
}

fn panic_body(_ctx: &TaskContext<'_>) -> TaskOutput {
    panic!("worker side detonation");
}

#[test]
fn run_worker_replaces_the_request_with_a_response() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("echo", env_echo_body);

    let dir = TempDir::new()?;
    let path = dir.path().join("artifact.json");
    let mut env = TaskEnv::new();
    env.insert("suite".to_string(), json!("fast"));
    write_request(&path, &ExchangeRequest::new("t1", 1, "echo", env, 0))?;

    run_worker(&registry, &path)?;

    let response = read_response(&path)?;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "t1.fast");
    assert_eq!(response.results[0].status, TestStatus::Pass);
    Ok(())
}

#[test]
fn run_worker_turns_a_panic_into_a_synthetic_result() -> TestResult {
    let mut registry = TaskRegistry::new();
    registry.register("boom", panic_body);

    let dir = TempDir::new()?;
    let path = dir.path().join("artifact.json");
    write_request(&path, &ExchangeRequest::new("t9", 7, "boom", TaskEnv::new(), 0))?;

    run_worker(&registry, &path)?;

    let response = read_response(&path)?;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "t9__except7");
    assert_eq!(response.results[0].status, TestStatus::Error);
    assert!(response.results[0].log.contains("worker side detonation"));
    Ok(())
}

#[test]
fn run_worker_reports_an_unknown_callback() -> TestResult {
    let registry = TaskRegistry::new();

    let dir = TempDir::new()?;
    let path = dir.path().join("artifact.json");
    write_request(&path, &ExchangeRequest::new("t2", 3, "missing", TaskEnv::new(), 1))?;

    run_worker(&registry, &path)?;

    let response = read_response(&path)?;
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "t2__except3");
    assert_eq!(response.results[0].status, TestStatus::Error);
    assert!(response.results[0].log.contains("unknown task callback"));
    Ok(())
}

#[tokio::test]
async fn successful_worker_process_delivers_its_results() -> TestResult {
    let exchange_dir = TempDir::new()?;
    let scratch = TempDir::new()?;

    // Stand-in for a real worker binary: overwrite the exchange artifact
    // (appended as the final argument) with a prepared response.
    let prepared = scratch.path().join("response.json");
    write_response(
        &prepared,
        &ExchangeResponse::new(vec![ResultRecord::new("t1.run", TestStatus::Pass)]),
    )?;
    let command = WorkerCommand::new("cp").arg(prepared.to_string_lossy());

    let status = plain_status();
    let fragment = FragmentData::new("t1.run", "run", "run_test");
    let mut worker =
        ProcessWorker::launch(&fragment, 0, &command, exchange_dir.path(), Arc::clone(&status))?;
    assert_eq!(worker.uid(), "t1.run");
    assert_eq!(worker.slot(), 0);
    assert_eq!(status.running_count(), 1);

    wait_done(&mut worker).await;
    let results = worker.collect_results();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "t1.run");
    assert_eq!(results[0].status, TestStatus::Pass);
    assert_eq!(status.running_count(), 0);
    assert_eq!(status.completed_count(), 1);
    assert!(dir_is_empty(&exchange_dir)?);
    Ok(())
}

#[tokio::test]
async fn dead_worker_process_yields_one_synthetic_result() -> TestResult {
    let exchange_dir = TempDir::new()?;

    // The appended artifact path lands in $0; the script ignores it.
    let command = WorkerCommand::new("sh")
        .arg("-c")
        .arg("echo boom >&2; exit 3");

    let status = plain_status();
    let fragment = FragmentData::new("t1.run", "run", "run_test");
    let mut worker =
        ProcessWorker::launch(&fragment, 1, &command, exchange_dir.path(), Arc::clone(&status))?;

    wait_done(&mut worker).await;
    // Give the output capture tasks a moment to drain the pipes.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let results = worker.collect_results();

    assert_eq!(results.len(), 1);
    assert!(results[0].id.starts_with("t1.run__except"));
    assert_eq!(results[0].status, TestStatus::Error);
    assert!(results[0].log.contains("exited with"));
    assert!(results[0].log.contains("boom"));
    assert!(dir_is_empty(&exchange_dir)?);
    Ok(())
}

#[tokio::test]
async fn corrupted_artifact_yields_one_synthetic_result() -> TestResult {
    let exchange_dir = TempDir::new()?;

    // Exits zero but leaves garbage where the response should be.
    let command = WorkerCommand::new("sh")
        .arg("-c")
        .arg("echo garbage > \"$0\"");

    let status = plain_status();
    let fragment = FragmentData::new("t1.run", "run", "run_test");
    let mut worker =
        ProcessWorker::launch(&fragment, 0, &command, exchange_dir.path(), Arc::clone(&status))?;

    wait_done(&mut worker).await;
    let results = worker.collect_results();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, TestStatus::Error);
    assert!(results[0].log.contains("unreadable exchange artifact"));
    assert!(dir_is_empty(&exchange_dir)?);
    Ok(())
}

#[tokio::test]
async fn dropping_an_uncollected_worker_removes_its_artifact() -> TestResult {
    let exchange_dir = TempDir::new()?;

    let command = WorkerCommand::new("true");
    let status = plain_status();
    let fragment = FragmentData::new("t1.run", "run", "run_test");
    let mut worker =
        ProcessWorker::launch(&fragment, 0, &command, exchange_dir.path(), status)?;

    wait_done(&mut worker).await;
    drop(worker);

    assert!(dir_is_empty(&exchange_dir)?);
    Ok(())
}
