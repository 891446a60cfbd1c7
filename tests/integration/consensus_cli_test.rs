//! `swarmctl consensus` round trip through the log file, driven entirely
//! through the CLI surface rather than `SwarmNode` directly.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn swarmctl(dir: &Path, log_path: &Path) -> Command {
    let mut cmd = Command::cargo_bin("swarmctl").unwrap();
    cmd.current_dir(dir);
    cmd.args(["--log-path", log_path.to_str().unwrap()]);
    cmd
}

#[test]
fn propose_vote_and_evaluate_reaches_approval() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("consensus.log");

    let propose_out = swarmctl(dir.path(), &log_path)
        .args([
            "--json",
            "consensus",
            "propose",
            "ship it",
            "cut the release",
            "--node-id",
            "node-a",
            "--approve",
            "--confidence",
            "0.9",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let proposal: Value = serde_json::from_slice(&propose_out).unwrap();
    let proposal_id = proposal["id"].as_str().unwrap().to_string();

    swarmctl(dir.path(), &log_path)
        .args([
            "consensus",
            "vote",
            &proposal_id,
            "--node-id",
            "node-b",
            "--approve",
            "--confidence",
            "0.8",
        ])
        .assert()
        .success();

    let evaluate_out = swarmctl(dir.path(), &log_path)
        .args(["--json", "consensus", "evaluate", &proposal_id])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let outcome: Value = serde_json::from_slice(&evaluate_out).unwrap();

    assert_eq!(outcome["approved"], true);
    assert_eq!(outcome["vote_count"], 2);
}
