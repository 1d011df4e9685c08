//! Exercises the `fallout` binary itself: argument parsing, exit codes, and
//! stdout shape for the `validate`/`run` subcommands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn write_workload(dir: &tempfile::TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("workload.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    path
}

#[test]
fn validate_accepts_a_well_formed_workload() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(
        &dir,
        r#"
phases:
  - text1:
      module: emit
      properties:
        value: a
checkers:
  no_failures:
    checker: nofail
"#,
    );

    Command::cargo_bin("fallout")
        .unwrap()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("is a valid workload"));
}

#[test]
fn validate_rejects_an_unknown_module_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_workload(
        &dir,
        r#"
phases:
  - only:
      module: does_not_exist
"#,
    );

    Command::cargo_bin("fallout")
        .unwrap()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does_not_exist"));
}

#[test]
fn run_writes_an_artifact_and_reports_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let workload_path = write_workload(
        &dir,
        r#"
phases:
  - text1:
      module: emit
      properties:
        value: a
checkers:
  no_failures:
    checker: nofail
"#,
    );
    let artifact_dir = dir.path().join("artifacts");
    let log_dir = dir.path().join("logs");

    Command::cargo_bin("fallout")
        .unwrap()
        .arg("--artifact-dir")
        .arg(&artifact_dir)
        .arg("--log-dir")
        .arg(&log_dir)
        .arg("run")
        .arg(&workload_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("verdict: Pass"))
        .stdout(predicate::str::contains("artifact written to"));

    let entries: Vec<_> = std::fs::read_dir(&artifact_dir).unwrap().collect();
    assert_eq!(entries.len(), 1, "expected exactly one run artifact file");
}

#[test]
fn run_exits_nonzero_when_the_verdict_fails() {
    let dir = tempfile::tempdir().unwrap();
    let workload_path = write_workload(
        &dir,
        r#"
phases:
  - boom:
      module: panic
checkers:
  no_failures:
    checker: nofail
"#,
    );

    Command::cargo_bin("fallout")
        .unwrap()
        .arg("--artifact-dir")
        .arg(dir.path().join("artifacts"))
        .arg("--log-dir")
        .arg(dir.path().join("logs"))
        .arg("run")
        .arg(&workload_path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("verdict: Fail"));
}
