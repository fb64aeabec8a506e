use std::error::Error;
use std::fs;
use std::time::Duration;

use fragdag::{ResultRecord, RunningStatus, TestStatus};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn status(max_consecutive_failures: u32) -> RunningStatus {
    RunningStatus::new(None, Duration::ZERO, max_consecutive_failures)
}

#[test]
fn start_and_complete_move_fragments_between_sets() {
    let status = status(0);
    status.set_total(2);

    status.start("t1.run");
    status.start("t2.run");
    assert_eq!(status.running_count(), 2);
    assert_eq!(status.completed_count(), 0);

    status.complete("t1.run");
    assert_eq!(status.running_count(), 1);
    assert_eq!(status.completed_count(), 1);

    status.complete("t2.run");
    assert_eq!(status.running_count(), 0);
    assert_eq!(status.completed_count(), 2);
}

#[test]
fn counters_accumulate_per_status() {
    let status = status(0);

    status.process_result(&ResultRecord::new("a", TestStatus::Pass));
    status.process_result(&ResultRecord::new("b", TestStatus::Pass));
    status.process_result(&ResultRecord::new("c", TestStatus::Fail));
    status.process_result(&ResultRecord::new("d", TestStatus::Skip));

    let counters = status.counters();
    assert_eq!(counters.get(&TestStatus::Pass), Some(&2));
    assert_eq!(counters.get(&TestStatus::Fail), Some(&1));
    assert_eq!(counters.get(&TestStatus::Skip), Some(&1));
    assert_eq!(counters.get(&TestStatus::Error), None);
}

#[test]
fn consecutive_failures_trip_the_breaker() {
    let status = status(2);

    status.process_result(&ResultRecord::new("a", TestStatus::Fail));
    assert!(!status.abort_requested());

    status.process_result(&ResultRecord::new("b", TestStatus::Error));
    assert!(status.abort_requested());

    // The flag stays set no matter what arrives afterwards.
    status.process_result(&ResultRecord::new("c", TestStatus::Pass));
    assert!(status.abort_requested());
}

#[test]
fn a_success_resets_the_failure_streak() {
    let status = status(2);

    status.process_result(&ResultRecord::new("a", TestStatus::Fail));
    status.process_result(&ResultRecord::new("b", TestStatus::Pass));
    status.process_result(&ResultRecord::new("c", TestStatus::Fail));
    assert!(!status.abort_requested());
}

#[test]
fn xfail_does_not_count_as_a_failure() {
    let status = status(2);

    status.process_result(&ResultRecord::new("a", TestStatus::Fail));
    status.process_result(&ResultRecord::new("b", TestStatus::XFail));
    status.process_result(&ResultRecord::new("c", TestStatus::Fail));
    assert!(!status.abort_requested());
}

#[test]
fn zero_threshold_disables_the_breaker() {
    let status = status(0);

    for i in 0..50 {
        status.process_result(&ResultRecord::new(format!("t{i}"), TestStatus::Fail));
    }
    assert!(!status.abort_requested());
}

#[test]
#[should_panic(expected = "started twice")]
fn starting_a_fragment_twice_panics() {
    let status = status(0);
    status.start("t1.run");
    status.start("t1.run");
}

#[test]
#[should_panic(expected = "started after completion")]
fn restarting_a_completed_fragment_panics() {
    let status = status(0);
    status.start("t1.run");
    status.complete("t1.run");
    status.start("t1.run");
}

#[test]
#[should_panic(expected = "is not running")]
fn completing_a_fragment_that_never_started_panics() {
    let status = status(0);
    status.complete("t1.run");
}

#[test]
fn dump_writes_a_readable_snapshot() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("status");
    let status = RunningStatus::new(Some(path.clone()), Duration::ZERO, 0);

    status.set_total(3);
    status.start("t1.run");
    status.start("t2.run");
    status.complete("t1.run");
    status.process_result(&ResultRecord::new("t1", TestStatus::Pass));
    status.process_result(&ResultRecord::new("t1b", TestStatus::Fail));

    let text = fs::read_to_string(&path)?;
    assert!(text.contains("Test fragments: 1 / 3 completed"));
    assert!(text.contains("Currently running:"));
    assert!(text.contains("  t2.run"));
    assert!(!text.contains("  t1.run\n"));
    assert!(text.contains("PASS"));
    assert!(text.contains("FAIL"));
    Ok(())
}

#[test]
fn dump_before_the_total_is_known_says_so() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("status");
    let status = RunningStatus::new(Some(path.clone()), Duration::ZERO, 0);

    status.dump();

    let text = fs::read_to_string(&path)?;
    assert_eq!(text, "No test fragment yet");
    Ok(())
}

#[test]
fn dump_is_rate_limited() -> TestResult {
    let dir = TempDir::new()?;
    let path = dir.path().join("status");
    let status = RunningStatus::new(Some(path.clone()), Duration::from_secs(3600), 0);

    // First write goes through and arms the rate limit.
    status.set_total(2);
    let before = fs::read_to_string(&path)?;

    // Within the interval nothing is rewritten.
    status.start("t1.run");
    status.complete("t1.run");
    let after = fs::read_to_string(&path)?;
    assert_eq!(before, after);
    assert!(!after.contains("1 / 2"));
    Ok(())
}

#[test]
fn no_status_file_means_no_dump() {
    // Must not panic or try to write anywhere.
    let status = status(0);
    status.set_total(1);
    status.start("t1.run");
    status.complete("t1.run");
    status.dump();
}
