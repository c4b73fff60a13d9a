//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each run gets
//! its own HOME so configuration never touches the real one.

use std::io::Write;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &std::path::Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "voteclock-cli", "--"])
        .args(args)
        .env("HOME", home)
        .env_remove("VOTECLOCK_ENV")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("line is not JSON"))
        .collect()
}

fn snapshot_file() -> tempfile::NamedTempFile {
    let snapshot = serde_json::json!({
        "elections": [
            { "id": "open", "title": "Open", "end_date": "2999-01-01T00:00:00Z", "is_active": true },
            { "id": "closed", "title": "Closed", "end_date": "2000-01-01T00:00:00Z", "is_active": true }
        ],
        "candidates": [
            { "id": "c1", "name": "Ada", "position": "Chair", "election_id": "open" }
        ]
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(snapshot.to_string().as_bytes()).unwrap();
    file
}

#[test]
fn test_countdown_future() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["countdown", "2999-01-01T00:00:00Z"]);
    assert_eq!(code, 0, "countdown failed");
    let sample: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(sample["elapsed"], false);
}

#[test]
fn test_countdown_past_is_ended() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["countdown", "2000-01-01"]);
    assert_eq!(code, 0);
    let sample: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(sample["formatted"], "Ended");
    assert_eq!(sample["elapsed"], true);
}

#[test]
fn test_countdown_rejects_bad_deadline() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["countdown", "whenever"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Invalid deadline"));
}

#[test]
fn test_elections_status() {
    let home = tempfile::tempdir().unwrap();
    let file = snapshot_file();
    let path = file.path().to_str().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["elections", "status", "--file", path]);
    assert_eq!(code, 0);
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["state"], "active");
    assert_eq!(rows[1]["state"], "completed");
    assert_eq!(rows[1]["countdown"], "Ended");

    let (stdout, _, _) = run_cli(home.path(), &["elections", "status", "--file", path, "--active"]);
    let rows: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "open");
}

#[test]
fn test_elections_can_vote() {
    let home = tempfile::tempdir().unwrap();
    let file = snapshot_file();
    let path = file.path().to_str().unwrap();

    let (_, _, code) = run_cli(home.path(), &["elections", "can-vote", "--file", path, "open"]);
    assert_eq!(code, 0);

    let (_, stderr, code) = run_cli(home.path(), &["elections", "can-vote", "--file", path, "closed"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("closed"));
}

#[test]
fn test_elections_candidates() {
    let home = tempfile::tempdir().unwrap();
    let file = snapshot_file();
    let path = file.path().to_str().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["elections", "candidates", "--file", path, "open"]);
    assert_eq!(code, 0);
    let positions: Vec<serde_json::Value> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(positions[0]["title"], "Chair");
}

#[test]
fn test_session_simulate() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["session", "simulate", "--duration-secs", "10", "--prompt-secs", "3", "--extend-at", "8"],
    );
    assert_eq!(code, 0, "simulate failed: {stderr}");
    let types: Vec<String> = json_lines(&stdout)
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        types,
        vec![
            "SessionStarted",
            "SessionPrompted",
            "SessionExtended",
            "SessionPrompted",
            "SessionExpired"
        ]
    );
    assert!(stderr.contains("sign-out calls: 1"));
}

#[test]
fn test_config_get_default() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "session.duration_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "300");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "session.prompt_window_secs", "900"]);
    assert_ne!(code, 0);
}
