//! E2E tests for `chart` and `sim`.
//!
//! Each test runs `tally` as a subprocess in an isolated temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn tally_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("tally"));
    cmd.current_dir(dir);
    cmd.env("XDG_CONFIG_HOME", dir);
    cmd.env_remove("FORMAT");
    cmd.env("TALLY_LOG", "error");
    cmd
}

/// Write a dataset envelope whose `data` holds each record JSON-encoded.
fn write_dataset(dir: &Path, records: &[Value]) -> PathBuf {
    let encoded: Vec<String> = records.iter().map(Value::to_string).collect();
    let path = dir.join("apps.json");
    fs::write(&path, json!({ "data": encoded }).to_string()).expect("write dataset");
    path
}

fn leaderboard(dir: &Path) -> PathBuf {
    write_dataset(
        dir,
        &[
            json!({"name": "Swap", "widget_name": "s.near/widget/Swap", "num_votes": 12, "tags": ["defi"]}),
            json!({"name": "Chat", "widget_name": "c.near/widget/Chat", "num_votes": 40, "tags": ["social"]}),
            json!({"name": "Lend", "widget_name": "l.near/widget/Lend", "num_votes": 7, "tags": ["defi"]}),
            json!({"name": "Ghost", "widget_name": "g.near/widget/Ghost", "num_votes": 0, "tags": ["defi"]}),
        ],
    )
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("tally should not crash");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

// ---------------------------------------------------------------------------
// chart
// ---------------------------------------------------------------------------

#[test]
fn chart_lists_leaders_first_and_drops_zero_votes() {
    let dir = TempDir::new().expect("tempdir");
    let apps = leaderboard(dir.path());

    tally_cmd(dir.path())
        .args(["chart", "--apps"])
        .arg(&apps)
        .assert()
        .success()
        .stdout("Chat\t40\nSwap\t12\nLend\t7\n");
}

#[test]
fn chart_json_is_ascending_for_horizontal_bars() {
    let dir = TempDir::new().expect("tempdir");
    let apps = leaderboard(dir.path());

    let out = run_json(
        tally_cmd(dir.path())
            .args(["chart", "--json", "--top", "2", "--title", "Top", "--apps"])
            .arg(&apps),
    );
    assert_eq!(out["state"], "ready");
    assert_eq!(out["title"], "Top");
    assert_eq!(out["definition"]["yAxis"]["data"], json!(["Swap", "Chat"]));
    assert_eq!(out["definition"]["series"][0]["data"], json!([12, 40]));
    assert_eq!(out["definition"]["series"][0]["type"], "bar");
}

#[test]
fn chart_category_filter() {
    let dir = TempDir::new().expect("tempdir");
    let apps = leaderboard(dir.path());

    tally_cmd(dir.path())
        .args(["chart", "--category", "defi", "--apps"])
        .arg(&apps)
        .assert()
        .success()
        .stdout("Swap\t12\nLend\t7\n");
}

#[test]
fn chart_with_nothing_to_rank_says_so() {
    let dir = TempDir::new().expect("tempdir");
    let apps = leaderboard(dir.path());

    tally_cmd(dir.path())
        .args(["chart", "--category", "games", "--apps"])
        .arg(&apps)
        .assert()
        .success()
        .stdout(predicate::str::contains("does not have data to show yet"));

    let out = run_json(
        tally_cmd(dir.path())
            .args(["chart", "--json", "--category", "games", "--apps"])
            .arg(&apps),
    );
    assert_eq!(out["state"], "no_data");
}

#[test]
fn chart_bad_envelope_is_coded() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("apps.json");
    fs::write(&path, r#"{"rows": []}"#).expect("write");

    tally_cmd(dir.path())
        .args(["chart", "--apps"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E4001]"));
}

#[test]
fn chart_config_sets_defaults() {
    let dir = TempDir::new().expect("tempdir");
    let apps = leaderboard(dir.path());
    fs::create_dir_all(dir.path().join(".tally")).expect("mkdir");
    fs::write(
        dir.path().join(".tally/config.toml"),
        "[chart]\ntop_limit = 1\ncategory_filter = \"defi\"\n",
    )
    .expect("write config");

    tally_cmd(dir.path())
        .args(["chart", "--apps"])
        .arg(&apps)
        .assert()
        .success()
        .stdout("Swap\t12\n");
}

// ---------------------------------------------------------------------------
// sim
// ---------------------------------------------------------------------------

#[test]
fn sim_small_campaign_passes() {
    let dir = TempDir::new().expect("tempdir");

    let out = run_json(tally_cmd(dir.path()).args([
        "sim", "--json", "--seeds", "0..8", "--rounds", "12", "--viewers", "2",
    ]));
    assert_eq!(out["seeds_run"], 8);
    assert_eq!(out["seeds_passed"], 8);
    assert_eq!(out["all_passed"], true);
    assert!(out["first_failure"].is_null());
}

#[test]
fn sim_text_summary() {
    let dir = TempDir::new().expect("tempdir");

    tally_cmd(dir.path())
        .args(["sim", "--seeds", "0..3", "--rounds", "6"])
        .assert()
        .success()
        .stdout(predicate::str::contains("campaign seeds_run=3"))
        .stdout(predicate::str::contains("all_passed=true"));
}

#[test]
fn sim_replay_prints_trace() {
    let dir = TempDir::new().expect("tempdir");

    let out = run_json(tally_cmd(dir.path()).args([
        "sim", "--json", "--replay", "7", "--rounds", "10",
    ]));
    assert_eq!(out["seed"], 7);
    let trace = out["trace"].as_array().expect("trace");
    assert!(!trace.is_empty());
    assert!(trace.iter().any(|event| event["event"] == "quiesce"));
    assert_eq!(trace[0]["event"], "observe");
    assert_eq!(out["violations"], json!([]));
}

#[test]
fn sim_rejects_empty_seed_range() {
    let dir = TempDir::new().expect("tempdir");

    tally_cmd(dir.path())
        .args(["sim", "--seeds", "4..4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is empty"));
}
