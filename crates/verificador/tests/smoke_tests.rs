//! Smoke tests for verificador CLI
//!
//! These tests drive the binary end to end. `run` uses `--dry-run` so no
//! browser is needed.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the verificador binary
fn verificador() -> Command {
    let mut cmd = Command::cargo_bin("verificador").expect("verificador binary should exist");
    cmd.env_remove("RUST_LOG").arg("--color").arg("never");
    cmd
}

/// Write the example config with artifacts under `dir`
fn example_config(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    verificador().args(["init"]).arg(&path).assert().success();

    let artifacts = dir.join("artifacts");
    let mut yaml = fs::read_to_string(&path).unwrap();
    yaml = yaml.replace(
        "artifact_dir: verificar-artifacts",
        &format!("artifact_dir: {}", artifacts.display()),
    );
    fs::write(&path, yaml).unwrap();
    path
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    verificador()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    verificador()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("locale"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_no_args_exits_one() {
    verificador().assert().code(1).stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_flag_exits_one() {
    verificador()
        .args(["run", "--bogus", "x"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--bogus"));
}

#[test]
fn test_run_subcommand_help() {
    verificador()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--artifact-dir"));
}

// ============================================================================
// Init / Validate
// ============================================================================

#[test]
fn test_init_writes_valid_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("verificar.yaml");

    verificador().arg("init").arg(&path).assert().success();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("Glucosa"));
    assert!(content.contains("meal-scanner"));

    verificador()
        .arg("validate")
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("es/meal-scanner"));
}

#[test]
fn test_init_refuses_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("verificar.yaml");
    fs::write(&path, "keep").unwrap();

    verificador()
        .arg("init")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "keep");
}

#[test]
fn test_validate_rejects_invalid_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    fs::write(
        &path,
        r"
base_url: localhost:3000
target_locale:
  code: es
  anchor_probe_text: Glucosa
  menu_entry_strategies:
    - exact_text: Español
navigation_target:
  name: meal-scanner
  strategies:
    - exact_text: Escanear Comida
expected_text:
  - classification: correct
    text: Subir de la galería
",
    )
    .unwrap();

    verificador()
        .arg("validate")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("scheme"));
}

#[test]
fn test_validate_missing_file() {
    verificador()
        .args(["validate", "does-not-exist.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist.yaml"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_dry_run_passes_with_exit_zero() {
    let temp = TempDir::new().unwrap();
    let config = example_config(temp.path(), "es.yaml");

    verificador()
        .args(["run", "--dry-run", "-c"])
        .arg(&config)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("es/meal-scanner: PASS"));

    let artifacts = temp.path().join("artifacts");
    assert!(artifacts.join("report.json").exists());
    assert!(artifacts.join("report.jsonl").exists());
    assert!(artifacts.join("junit.xml").exists());
    assert!(artifacts.join("1-ensure-locale.png").exists());
    assert!(artifacts.join("2-navigate.json").exists());
}

#[test]
fn test_dry_run_json_format() {
    let temp = TempDir::new().unwrap();
    let config = example_config(temp.path(), "es.yaml");

    let output = verificador()
        .args(["run", "--dry-run", "--format", "json", "-c"])
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["locale"], "es");
    assert_eq!(reports[0]["outcome"], "success");
    assert_eq!(reports[0]["classification"], "correct");
}

#[test]
fn test_artifact_dir_override() {
    let temp = TempDir::new().unwrap();
    let config = example_config(temp.path(), "es.yaml");
    let out = temp.path().join("elsewhere");

    verificador()
        .args(["-q", "run", "--dry-run", "-c"])
        .arg(&config)
        .arg("--artifact-dir")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("report.json").exists());
}

#[test]
fn test_run_invalid_config_exits_one() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bad.yaml");
    fs::write(&path, "base_url: [").unwrap();

    verificador()
        .args(["run", "--dry-run", "-c"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_run_requires_config() {
    verificador().args(["run", "--dry-run"]).assert().code(1);
}

#[test]
fn test_dry_run_failure_exits_one() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("es.yaml");
    let artifacts = temp.path().join("artifacts");
    // The scripted page shows the Spanish text, which this order never accepts
    fs::write(
        &path,
        format!(
            r"
base_url: http://localhost:3000
artifact_dir: {}
target_locale:
  code: es
  anchor_probe_text: Glucosa
  menu_entry_strategies:
    - exact_text: Español
navigation_target:
  name: meal-scanner
  strategies:
    - exact_text: Escanear Comida
expected_text:
  - classification: correct
    text: Subir de la galería
  - classification: fallback_language
    text: Upload from gallery
order: [fallback_language, unknown]
",
            artifacts.display()
        ),
    )
    .unwrap();

    verificador()
        .args(["run", "--dry-run", "-c"])
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("es/meal-scanner: FAIL"))
        .stderr(predicate::str::contains("1 of 1 run(s) failed"));

    let report = fs::read_to_string(artifacts.join("report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(report["outcome"], "failure");
}
