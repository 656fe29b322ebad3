//! End-to-end tests driving a scheduler through the text protocol.

use rmsched::{NoopPriorityController, RmScheduler, SchedulerConfig, StaticResolver};
use rmsched_control::{SessionSummary, load_config, run};
use std::io::{Cursor, Write};
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn scheduler() -> Result<RmScheduler, Box<dyn std::error::Error>> {
    let config = SchedulerConfig::builder()
        .first_release_offset(Duration::from_secs(3600))
        .build()?;
    let scheduler = RmScheduler::new(
        config,
        StaticResolver::with_ids([1, 2, 3]),
        NoopPriorityController,
    )?;
    scheduler.start()?;
    Ok(scheduler)
}

#[test]
fn test_session_applies_commands_and_reports() -> TestResult {
    let s = scheduler()?;
    let input = "\
# two tasks, the second over the bound
R, 1, 100, 20.
R, 2, 50, 40.
R, 2, 50, 10.
S
D, 1.
S
";
    let mut out = Vec::new();
    let summary = run(&s, Cursor::new(input), &mut out)?;

    assert_eq!(
        summary,
        SessionSummary {
            applied: 5,
            malformed: 0,
            rejected: 1
        }
    );
    let text = String::from_utf8(out)?;
    assert_eq!(
        text,
        "Process # 1 details:\nPID:1\nP:100\nC:20\n\
         Process # 2 details:\nPID:2\nP:50\nC:10\n\
         Process # 1 details:\nPID:2\nP:50\nC:10\n"
    );
    Ok(())
}

#[test]
fn test_session_survives_bad_lines() -> TestResult {
    let s = scheduler()?;
    let input = "Q, 1.\nR, 1, 100\nY, 9.\nD, 3.\nD, 3.\nR, 3, 200, 10.\n";
    let mut out = Vec::new();
    let summary = run(&s, Cursor::new(input), &mut out)?;

    // Y/D for unregistered ids are rejected, not fatal.
    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.applied, 1);
    assert_eq!(s.snapshot()?.len(), 1);
    assert!(out.is_empty());
    Ok(())
}

#[test]
fn test_yield_from_sleeping_task_is_accepted() -> TestResult {
    let s = scheduler()?;
    let mut out = Vec::new();
    let summary = run(&s, Cursor::new("R, 1, 100, 10.\nY, 1.\n"), &mut out)?;
    assert_eq!(summary.applied, 2);
    Ok(())
}

#[test]
fn test_load_config_from_file() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"utilization_bound_permille": 500, "wake_capacity": 8}}"#
    )?;

    let config = load_config(file.path())?;
    assert_eq!(config.utilization_bound_permille, 500);
    assert_eq!(config.wake_capacity, 8);
    assert_eq!(config.rt_priority, 99);
    Ok(())
}

#[test]
fn test_load_config_rejects_invalid_values() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(file, r#"{{"rt_priority": 0}}"#)?;
    assert!(load_config(file.path()).is_err());
    Ok(())
}
