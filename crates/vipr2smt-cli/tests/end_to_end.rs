//! Whole-binary runs over a toy certificate and a stub solver runner.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

const CERTIFICATE: &str = "\
VAR 1
x
INT 0
OBJ min 1 0 1
CON 1 0
c1 G 0 OBJ
RTP range 0 0
SOL 1
s1 1 0 0
DER 2
d1 G 0 1 0 1 { asm } -1
d2 G 0 1 0 1 { lin 1 1 1 } -1
";

fn write_runner(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("runner.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

fn write_certificate(dir: &Path) -> PathBuf {
    let path = dir.join("toy.vipr");
    fs::write(&path, CERTIFICATE).unwrap();
    path
}

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_vipr2smt"))
}

#[test]
fn matching_expectation_exits_zero_and_prints_the_summary() {
    let dir = tempfile::tempdir().unwrap();
    let runner = write_runner(dir.path(), "echo sat");
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .arg("--runner")
        .arg(&runner)
        .output()
        .expect("binary runs");

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        result.status.success(),
        "expected success, stderr: {stderr}"
    );
    let summary = stderr
        .lines()
        .find(|line| line.starts_with("Results: "))
        .expect("summary line present");
    let fields: Vec<&str> = summary.split('|').collect();
    assert_eq!(fields.len(), 14);
    assert_eq!(fields[1], "OK");
    // 1 variable, 1 problem constraint, 2 derivations, 1 solution.
    assert_eq!(&fields[7..11], &["1", "1", "2", "1"]);
}

#[test]
fn unsat_runner_fails_an_expected_sat_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = write_runner(dir.path(), "echo unsat");
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .arg("--runner")
        .arg(&runner)
        .output()
        .expect("binary runs");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("|ERR|"), "stderr: {stderr}");
}

#[test]
fn unsat_runner_confirms_an_expected_unsat_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = write_runner(dir.path(), "echo unsat");
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("unsat")
        .arg("--runner")
        .arg(&runner)
        .output()
        .expect("binary runs");

    assert!(result.status.success());
}

#[test]
fn single_file_mode_leaves_one_formula_path() {
    let dir = tempfile::tempdir().unwrap();
    let runner = write_runner(dir.path(), "echo sat");
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .arg("--runner")
        .arg(&runner)
        .arg("--single-file")
        .output()
        .expect("binary runs");

    assert!(result.status.success());
    // The runner consumed and removed the single file.
    assert!(!output.exists());
}

#[test]
fn dump_prints_the_certificate_without_solving() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .arg("--dump")
        .output()
        .expect("binary runs");

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("x: Fraction"));
    assert!(stdout.contains("Derivations:"));
    // No formula files were produced.
    assert!(!dir.path().join("formula.SOL").exists());
}

#[test]
fn json_report_records_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let runner = write_runner(dir.path(), "echo sat");
    let input = write_certificate(dir.path());
    let output = dir.path().join("formula");
    let report = dir.path().join("report.json");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .arg("--runner")
        .arg(&runner)
        .arg("--json-report")
        .arg(&report)
        .output()
        .expect("binary runs");

    assert!(result.status.success());
    let text = fs::read_to_string(&report).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["verdict"], "OK");
    assert_eq!(parsed["certificate"]["derived_constraints"], 2);
    assert_eq!(parsed["certificate"]["feasible"], true);
}

#[test]
fn malformed_certificates_fail_with_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.vipr");
    fs::write(&input, "VAR 1\nx\nCON 1 0\nc1 Q 0 1 0 1\n").unwrap();
    let output = dir.path().join("formula");

    let result = binary()
        .arg(&input)
        .arg(&output)
        .arg("sat")
        .output()
        .expect("binary runs");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("direction"), "stderr: {stderr}");
}

#[test]
fn bad_expectation_is_rejected_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_certificate(dir.path());

    let result = binary()
        .arg(&input)
        .arg(dir.path().join("formula"))
        .arg("maybe")
        .output()
        .expect("binary runs");

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("sat"), "stderr: {stderr}");
}
