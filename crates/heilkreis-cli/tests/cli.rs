//! End-to-end tests for the `heilkreis` binary.
//!
//! Every test works in its own scratch directory holding the catalog, the
//! policy table and the journals.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("heilkreis_cli_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("logs")).unwrap_or_else(|e| panic!("scratch dir: {e}"));
    dir
}

fn raise(dir: &Path, alert: &str) {
    let line = format!(
        "{{\"ts\":\"2024-05-01T10:00:00Z\",\"alert_type\":\"{alert}\",\"message\":\"test\"}}\n"
    );
    let path = dir.join("logs").join("issue_log.jsonl");
    let mut existing = fs::read_to_string(&path).unwrap_or_default();
    existing.push_str(&line);
    fs::write(&path, existing).unwrap_or_else(|e| panic!("issue log: {e}"));
}

fn heilkreis(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("heilkreis").unwrap_or_else(|e| panic!("binary: {e}"));
    cmd.env_remove("HEILKREIS_DEPLOY_CMD")
        .env_remove("HEILKREIS_ENV")
        .env_remove("HEILKREIS_URL")
        .env_remove("STAGING_DEPLOY_CMD")
        .env_remove("RUST_LOG")
        .arg("--catalog")
        .arg(dir.join("config").join("states_actions.json"))
        .arg("--policy-table")
        .arg(dir.join("data").join("policy_table.json"))
        .arg("--log-dir")
        .arg(dir.join("logs"))
        .arg("--epsilon")
        .arg("0");
    cmd
}

#[test]
#[cfg(unix)]
fn check_remediates_connection_failure() {
    let dir = scratch("check_ok");
    raise(&dir, "CONNECTION_FAILED");

    heilkreis(&dir)
        .args(["check", "--deploy-cmd", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "connection_failed -> restart_deployment: Success (value 0.6000)",
        ))
        .stderr(predicate::str::contains(
            "connection_failed -> restart_deployment: Success",
        ));

    assert!(dir.join("config").join("states_actions.json").exists());

    heilkreis(&dir)
        .args(["policy", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"action\": \"restart_deployment\""))
        .stdout(predicate::str::contains("\"value\": 0.6"));

    // Resolution is per process; a new one-shot run sees the same issue again.
    heilkreis(&dir)
        .args(["check", "--deploy-cmd", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(value 0.8400)"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_without_deploy_command_fails_and_penalizes() {
    let dir = scratch("check_fail");
    raise(&dir, "SLOW_RESPONSE");

    heilkreis(&dir)
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("slow_response -> rollback: Failed"));

    heilkreis(&dir)
        .arg("policy")
        .assert()
        .success()
        .stdout(predicate::str::contains("slow_response\trollback\t-0.6000"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_skips_unknown_state() {
    let dir = scratch("check_skip");
    raise(&dir, "DISK_FULL");

    heilkreis(&dir)
        .arg("check")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("disk_full: no policy, skipped"));

    heilkreis(&dir)
        .arg("policy")
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy table is empty."));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_catalog_refuses_to_start() {
    let dir = scratch("bad_catalog");
    fs::create_dir_all(dir.join("config")).unwrap_or_else(|e| panic!("{e}"));
    fs::write(dir.join("config").join("states_actions.json"), "{ not json")
        .unwrap_or_else(|e| panic!("{e}"));

    heilkreis(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed document"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn invalid_learning_rate_refuses_to_start() {
    let dir = scratch("bad_alpha");

    heilkreis(&dir)
        .args(["--alpha", "0", "policy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("alpha must be in (0, 1]"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn human_feedback_updates_table() {
    let dir = scratch("feedback");

    heilkreis(&dir)
        .args([
            "feedback",
            "--state",
            "connection_failed",
            "--action",
            "rollback",
            "--value",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("connection_failed -> rollback: 0.6000"));

    // With rollback now preferred, exploitation picks it.
    raise(&dir, "CONNECTION_FAILED");
    heilkreis(&dir)
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("connection_failed -> rollback: Failed"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn report_summarizes_healing_log() {
    let dir = scratch("report");
    raise(&dir, "CONNECTION_FAILED");
    for _ in 0..2 {
        heilkreis(&dir).arg("check").assert().code(1);
    }

    heilkreis(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 remediations, 0.0% successful"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn deploy_without_command_fails() {
    let dir = scratch("deploy");

    heilkreis(&dir)
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no deploy command configured"));

    let journal = fs::read_to_string(dir.join("logs").join("deployment_log.jsonl"))
        .unwrap_or_else(|e| panic!("deployment log: {e}"));
    assert!(journal.contains("\"status\":\"failed\""));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
#[cfg(unix)]
fn env_profile_supplies_deploy_command() {
    let dir = scratch("profile");
    let profiles = dir.join("config").join("env_profiles.json");
    fs::create_dir_all(profiles.parent().unwrap_or(&dir)).unwrap_or_else(|e| panic!("config dir: {e}"));
    fs::write(&profiles, r#"{"staging": {"type": "docker", "port": 8080, "deploy_cmd": "false"}}"#)
        .unwrap_or_else(|e| panic!("profiles: {e}"));

    heilkreis(&dir)
        .args(["deploy", "--env", "staging", "--profiles"])
        .arg(&profiles)
        .assert()
        .failure();

    heilkreis(&dir)
        .env("STAGING_DEPLOY_CMD", "true")
        .args(["deploy", "--env", "staging", "--profiles"])
        .arg(&profiles)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment completed"));

    let journal = fs::read_to_string(dir.join("logs").join("deployment_log.jsonl"))
        .unwrap_or_else(|e| panic!("deployment log: {e}"));
    assert_eq!(journal.matches("\"env\":\"staging\"").count(), 2);

    heilkreis(&dir)
        .args(["deploy", "--env", "prod", "--profiles"])
        .arg(&profiles)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'prod' not found"));
    let _ = fs::remove_dir_all(&dir);
}
