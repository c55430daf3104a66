//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary home
//! directory, so configuration and database start empty.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_phaseplan-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("PHASEPLAN_ENV")
        .env_remove("PHASEPLAN_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn json(home: &Path, args: &[&str]) -> serde_json::Value {
    let stdout = run_ok(home, args);
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn setup() -> tempfile::TempDir {
    let home = tempfile::tempdir().unwrap();
    // Pin the offset so local times in assertions are UTC.
    run_ok(home.path(), &["config", "set", "scheduler.utc_offset_minutes", "0"]);
    home
}

#[test]
fn test_task_add_and_list() {
    let home = setup();
    let out = run_ok(
        home.path(),
        &["task", "add", "Write report", "--effort", "90", "--urgency", "T1", "--keywords", "writing"],
    );
    assert!(out.contains("Task created:"));

    let tasks = json(home.path(), &["task", "list", "--json"]);
    let tasks = tasks.as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["urgency"], "critical");
    assert_eq!(tasks[0]["effort_minutes"], 90);
}

#[test]
fn test_task_remove() {
    let home = setup();
    run_ok(home.path(), &["task", "add", "Tmp", "--effort", "30"]);
    let tasks = json(home.path(), &["task", "list", "--json"]);
    let id = tasks[0]["id"].as_str().unwrap().to_string();

    run_ok(home.path(), &["task", "remove", &id]);
    let (code, _, stderr) = run_cli(home.path(), &["task", "remove", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error: Task not found"));
}

#[test]
fn test_task_rejects_bad_urgency() {
    let home = setup();
    let (code, _, stderr) = run_cli(home.path(), &["task", "add", "X", "--effort", "30", "--urgency", "soon"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_habit_add_list_log() {
    let home = setup();
    run_ok(
        home.path(),
        &["habit", "add", "Run", "--weekly-goal", "90", "--min-session", "20", "--phase", "Dawn", "--days", "mon,wed,fri"],
    );
    let habits = json(home.path(), &["habit", "list", "--json"]);
    assert_eq!(habits[0]["title"], "Run");
    let id = habits[0]["id"].as_str().unwrap().to_string();

    let out = run_ok(home.path(), &["habit", "log", &id, "25"]);
    assert!(out.contains("Logged 25 min"));
    let (code, _, _) = run_cli(home.path(), &["habit", "log", "missing", "25"]);
    assert_eq!(code, 1);
}

#[test]
fn test_event_add_and_list() {
    let home = setup();
    run_ok(
        home.path(),
        &["event", "add-appointment", "Dentist", "--date", "2026-03-10", "--start", "10:00", "--end", "11:00"],
    );
    run_ok(
        home.path(),
        &["event", "add-anchor", "Yoga", "--date", "2026-03-10", "--start", "07:00", "--end", "07:30"],
    );
    let events = json(home.path(), &["event", "list", "--date", "2026-03-10", "--json"]);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["title"], "Yoga");
    assert_eq!(events[0]["kind"], "anchor");

    let (code, _, _) = run_cli(
        home.path(),
        &["event", "add-appointment", "Bad", "--start", "11:00", "--end", "10:00"],
    );
    assert_eq!(code, 1);
}

#[test]
fn test_plan_day_avoids_appointments() {
    let home = setup();
    run_ok(home.path(), &["config", "set", "profile.sleep_start", "22:00"]);
    run_ok(home.path(), &["config", "set", "profile.sleep_end", "08:00"]);
    run_ok(home.path(), &["task", "add", "Deep work", "--effort", "120", "--urgency", "high"]);
    run_ok(
        home.path(),
        &["event", "add-appointment", "Dentist", "--date", "2026-03-10", "--start", "08:00", "--end", "12:00"],
    );

    let summary = json(home.path(), &["plan", "day", "--date", "2026-03-10", "--json"]);
    assert_eq!(summary["items"][0]["status"], "fully_booked");

    let plans = json(home.path(), &["plan", "list", "--date", "2026-03-10", "--json"]);
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 2);
    for plan in plans {
        let start = plan["start_time"].as_str().unwrap();
        assert!(start >= "2026-03-10T12:00:00", "plan overlaps appointment: {start}");
    }
}

#[test]
fn test_plan_done() {
    let home = setup();
    run_ok(home.path(), &["task", "add", "Short", "--effort", "30"]);
    run_ok(home.path(), &["plan", "day", "--date", "2026-03-10"]);
    let plans = json(home.path(), &["plan", "list", "--date", "2026-03-10", "--json"]);
    let id = plans[0]["id"].as_str().unwrap().to_string();

    let out = run_ok(home.path(), &["plan", "done", &id]);
    assert!(out.contains("Plan done: Short (30 min)"));
    let tasks = json(home.path(), &["task", "list", "--json"]);
    assert_eq!(tasks[0]["effort_minutes"], 0);
}

#[test]
fn test_config_get_set() {
    let home = setup();
    assert_eq!(run_ok(home.path(), &["config", "get", "scheduler.candidate_limit"]).trim(), "50");
    run_ok(home.path(), &["config", "set", "scheduler.candidate_limit", "10"]);
    assert_eq!(run_ok(home.path(), &["config", "get", "scheduler.candidate_limit"]).trim(), "10");

    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "ui.dark_mode"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_config_show() {
    let home = setup();
    let out = run_ok(home.path(), &["config", "show"]);
    assert!(out.contains("[scheduler]"));
    assert!(out.contains("[[phases]]"));
    let cfg = json(home.path(), &["config", "show", "--json"]);
    assert_eq!(cfg["user"], "default");
}
