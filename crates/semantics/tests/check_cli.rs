//! Fixture-driven smoke tests for the `emberc check` subcommand (spec
//! §10.4). Drives the built binary against scratch JSON parse trees rather
//! than calling `embersem` directly, so these exercise the CLI's argument
//! parsing and file I/O as well as the pipeline.

use std::io::Write;
use std::process::Command;

fn emberc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_emberc"))
}

fn write_fixture(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

#[test]
fn check_reports_no_diagnostics_for_an_empty_program() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_fixture(
        &dir,
        "empty.json",
        r#"{"structures":[],"sum_types":[],"weak_aliases":[],"strong_aliases":[],"functions":[]}"#,
    );

    let output = emberc().arg("check").arg(&tree).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No diagnostics"));
}

#[test]
fn check_reports_a_diagnostic_and_exits_nonzero_for_an_unresolved_call() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_fixture(
        &dir,
        "bad.json",
        r#"{
            "structures": [], "sum_types": [], "weak_aliases": [], "strong_aliases": [],
            "functions": [{
                "name": "main",
                "params": [],
                "return_expression": null,
                "body": {
                    "entries": [
                        {"kind": "Statement", "value": {"name": "undeclared-word", "params": [], "at": 0}}
                    ]
                },
                "tags": [],
                "template_params": [],
                "at": 0
            }]
        }"#,
    );

    let output = emberc().arg("check").arg(&tree).output().unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("diagnostic"));
}

#[test]
fn check_rejects_malformed_json_with_a_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_fixture(&dir, "garbage.json", "not json");

    let output = emberc().arg("check").arg(&tree).output().unwrap();
    assert!(!output.status.success());
}
