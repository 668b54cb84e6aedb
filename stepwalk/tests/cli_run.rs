//! CLI tests for `stepwalk tree`, `validate` and `run`.
//!
//! Spawns the binary against plans written to a temp dir and checks exit
//! codes and printed output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use stepwalk::exit_codes;
use stepwalk::io::report_log::read_events;

const PASSING: &str = r#"{
    "scenario": "Login",
    "definitions": [
        { "pattern": "I open the login page" },
        { "pattern": "I log in as (\\w+)" }
    ],
    "steps": [
        { "text": "I open the login page" },
        { "text": "I log in as admin", "annotation": ":" }
    ]
}"#;

fn plan_with(steps: &str, definitions: &str) -> String {
    format!(r#"{{ "scenario": "Cart", "definitions": [{definitions}], "steps": [{steps}] }}"#)
}

fn write_plan(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("plan.json");
    fs::write(&path, contents).expect("write plan");
    path
}

fn stepwalk(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stepwalk"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("stepwalk")
}

#[test]
fn run_passing_plan_exits_ok() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_plan(temp.path(), PASSING);

    let output = stepwalk(temp.path(), &["run", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("root/1/1"));
    assert!(stdout.contains("scenario 'Login' passed (2 executed, 0 skipped)"));
}

#[test]
fn run_exit_code_follows_scenario_status() {
    let definitions = r#"
        { "pattern": "ok" },
        { "pattern": "soft", "outcome": "soft_fail" },
        { "pattern": "hard", "outcome": "hard_fail", "message": "boom" },
        { "pattern": "stop", "outcome": "abort" }"#;
    let cases = [
        (r#"{ "text": "ok" }, { "text": "soft" }"#, exit_codes::SOFT_FAILED),
        (r#"{ "text": "soft" }, { "text": "hard" }"#, exit_codes::FAILED),
        (r#"{ "text": "stop" }, { "text": "ok" }"#, exit_codes::ABORTED),
        (r#"{ "text": "unknown step" }"#, exit_codes::FAILED),
    ];

    for (steps, expected) in cases {
        let temp = tempfile::tempdir().expect("tempdir");
        write_plan(temp.path(), &plan_with(steps, definitions));
        let output = stepwalk(temp.path(), &["run", "plan.json"]);
        assert_eq!(output.status.code(), Some(expected), "steps: {steps}");
    }
}

#[test]
fn dry_run_invokes_nothing_and_passes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let definitions = r#"{ "pattern": "hard", "outcome": "hard_fail" }"#;
    write_plan(temp.path(), &plan_with(r#"{ "text": "hard" }"#, definitions));

    let output = stepwalk(temp.path(), &["run", "plan.json", "--dry-run"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&output.stdout).contains("skipped"));
}

#[test]
fn run_writes_jsonl_and_report_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_plan(temp.path(), PASSING);

    let output = stepwalk(
        temp.path(),
        &["run", "plan.json", "--jsonl", "out/events.jsonl", "--report", "report.json"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let events = read_events(&temp.path().join("out/events.jsonl")).expect("events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[2]["event"], "scenario");

    let report: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(temp.path().join("report.json")).expect("read report"),
    )
    .expect("report json");
    assert_eq!(report["scenario"]["status"], "passed");
    assert_eq!(report["nodes"].as_array().map(Vec::len), Some(2));
}

#[test]
fn config_file_enables_strict_depth() {
    let temp = tempfile::tempdir().expect("tempdir");
    let steps = r#"{ "text": "ok" }, { "text": "ok", "annotation": ":::" }"#;
    write_plan(temp.path(), &plan_with(steps, r#"{ "pattern": "ok" }"#));

    let output = stepwalk(temp.path(), &["tree", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    fs::write(temp.path().join("stepwalk.toml"), "strict_depth = true\n").expect("write config");
    let output = stepwalk(temp.path(), &["tree", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("skips a level"));
}

#[test]
fn validate_reports_schema_and_resolution_problems() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_plan(temp.path(), PASSING);
    let output = stepwalk(temp.path(), &["validate", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    write_plan(temp.path(), &plan_with(r#"{ "text": "nobody home" }"#, ""));
    let output = stepwalk(temp.path(), &["validate", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("undefined step: nobody home"));

    write_plan(temp.path(), r#"{ "scenario": "x", "steps": "nope" }"#);
    let output = stepwalk(temp.path(), &["validate", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("plan schema validation failed"));
}

#[test]
fn tree_prints_the_assembled_structure() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_plan(temp.path(), PASSING);
    let output = stepwalk(temp.path(), &["tree", "plan.json"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Login\n- I open the login page\n  - I log in as admin\n"
    );
}
