//! Integration tests for the otactl binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn otactl() -> Result<Command, Box<dyn std::error::Error>> {
    Ok(Command::cargo_bin("otactl")?)
}

#[test]
fn test_help_lists_commands() -> TestResult {
    otactl()?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"));
    Ok(())
}

#[test]
fn test_invalid_config_exit_code() -> TestResult {
    let dir = TempDir::new()?;
    let config = dir.path().join("ota.yaml");
    fs::write(&config, "request_timeout: 0\n")?;

    otactl()?
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("request_timeout"));
    Ok(())
}

#[test]
fn test_missing_slot_dir_is_not_provisioned() -> TestResult {
    let dir = TempDir::new()?;
    let missing = dir.path().join("no-slot");

    let output = otactl()?
        .args(["run", "--json", "--grace-secs", "0", "--slot-dir"])
        .arg(&missing)
        .output()?;

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8(output.stdout)?;
    let report: Value = serde_json::Deserializer::from_str(&stdout)
        .into_iter::<Value>()
        .next()
        .ok_or("no JSON report on stdout")??;
    assert_eq!(
        report["report"]["terminal"]["Cancelled"],
        Value::from("NotProvisioned")
    );
    Ok(())
}

#[test]
fn test_unconfigured_network_skips_update() -> TestResult {
    let dir = TempDir::new()?;

    otactl()?
        .args(["run", "--grace-secs", "0", "--network", "", "--slot-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No update"));
    Ok(())
}
