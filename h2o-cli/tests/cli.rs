//! Black-box tests of the `h2o` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn h2o() -> Command {
    Command::cargo_bin("h2o").unwrap()
}

#[test]
fn writes_numbered_event_log() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("run.out");

    h2o()
        .args(["2", "4", "0", "0", "--seed", "1", "--output"])
        .arg(&out)
        .assert()
        .success();

    let log = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = log.lines().collect();

    // 6 units: started, going to queue, creating, created
    assert_eq!(lines.len(), 24);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.starts_with(&format!("{}: ", i + 1)), "bad line {line}");
    }
    assert_eq!(log.matches("O 1: started").count(), 1);
    assert_eq!(log.matches("molecule 2 created").count(), 3);
    assert!(!log.contains("not enough"));
}

#[test]
fn leftovers_are_logged_as_rejected() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("run.out");

    h2o()
        .args(["3", "5", "5", "5", "--output"])
        .arg(&out)
        .assert()
        .success();

    let log = std::fs::read_to_string(&out).unwrap();
    assert_eq!(log.matches(": not enough H").count(), 1);
    assert_eq!(log.matches(": not enough O or H").count(), 1);
    assert_eq!(log.matches("creating molecule").count(), 6);
}

#[test]
fn summary_flag_prints_totals() {
    let dir = tempdir().unwrap();

    h2o()
        .current_dir(dir.path())
        .args(["3", "5", "0", "0", "--summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Molecules:         2"))
        .stdout(predicate::str::contains("Rejected:          1 O, 1 H"));

    // Default output file in the working directory
    assert!(dir.path().join("proj2.out").exists());
}

#[test]
fn json_flag_prints_summary() {
    let dir = tempdir().unwrap();

    let output = h2o()
        .current_dir(dir.path())
        .args(["1", "1", "0", "0", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["molecules"], 0);
    assert_eq!(summary["rejected_oxygen"], 1);
    assert_eq!(summary["rejected_hydrogen"], 1);
}

#[test]
fn config_file_supplies_output_and_seed() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("from-config.out");
    let config = dir.path().join("h2o.toml");
    std::fs::write(
        &config,
        format!("output = {:?}\nseed = 3\n", out.display().to_string()),
    )
    .unwrap();

    h2o()
        .args(["1", "2", "0", "0", "--config"])
        .arg(&config)
        .assert()
        .success();

    let log = std::fs::read_to_string(&out).unwrap();
    assert!(log.contains("molecule 1 created"));
}

#[test]
fn config_log_filter_enables_diagnostics() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("h2o.toml");
    std::fs::write(&config, "seed = 5\n\n[log]\nfilter = \"info\"\n").unwrap();

    h2o()
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["1", "2", "0", "0", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("Run complete"))
        .stderr(predicate::str::contains("Event log written"));
}

#[test]
fn default_filter_keeps_stderr_quiet() {
    let dir = tempdir().unwrap();

    h2o()
        .current_dir(dir.path())
        .env_remove("RUST_LOG")
        .args(["1", "2", "0", "0"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn zero_oxygen_is_invalid() {
    let dir = tempdir().unwrap();

    h2o()
        .current_dir(dir.path())
        .args(["0", "4", "0", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("oxygen unit count must be at least 1"));

    // Nothing is created for invalid parameters
    assert!(!dir.path().join("proj2.out").exists());
}

#[test]
fn delay_out_of_range_is_invalid() {
    let dir = tempdir().unwrap();

    h2o()
        .current_dir(dir.path())
        .args(["1", "2", "1001", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("max startup delay 1001ms"));
}

#[test]
fn wrong_argument_count_fails() {
    h2o().args(["1", "2"]).assert().failure();
}

#[test]
fn unwritable_output_fails() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("missing-dir").join("run.out");

    h2o()
        .args(["1", "2", "0", "0", "--output"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open event log"));
}

#[test]
fn bad_config_fails() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("h2o.toml");
    std::fs::write(&config, "seed = [").unwrap();

    h2o()
        .current_dir(dir.path())
        .args(["1", "2", "0", "0", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse config file"));
}
