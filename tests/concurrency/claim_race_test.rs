//! Cross-process task-board claim races.
//!
//! Spawns real `swarmctl` processes against a shared board directory and
//! checks the board's file-locking actually serializes claims: exactly one
//! worker should win each task, and the board should end up fully drained.

use assert_cmd::Command;
use serde_json::Value;
use std::path::Path;
use std::process::Child;
use tempfile::TempDir;

fn swarmctl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("swarmctl").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn post_task(dir: &Path, id: &str, kind: &str) {
    swarmctl(dir)
        .args(["board", "post", id, kind, "d"])
        .assert()
        .success();
}

fn list_all(dir: &Path) -> Vec<Value> {
    let output = swarmctl(dir)
        .args(["--json", "board", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("board list --json should produce a JSON array")
}

#[test]
fn concurrent_workers_never_double_claim_a_task() {
    let dir = TempDir::new().unwrap();

    for i in 0..20 {
        post_task(dir.path(), &format!("t{i}"), "ANALYZE");
    }

    let workers: Vec<Child> = (0..4)
        .map(|i| {
            swarmctl(dir.path())
                .args([
                    "worker-loop",
                    "--node-id",
                    &format!("worker-{i}"),
                ])
                .spawn()
                .expect("worker-loop should spawn")
        })
        .collect();

    for mut worker in workers {
        let status = worker.wait().expect("worker-loop should exit");
        assert!(status.success());
    }

    let tasks = list_all(dir.path());
    assert_eq!(tasks.len(), 20);

    for task in &tasks {
        assert_eq!(task["status"], "COMPLETED");
    }

    let claimants: std::collections::HashSet<&str> = tasks
        .iter()
        .map(|t| t["claimed_by"].as_str().expect("completed task has a claimant"))
        .collect();
    assert!(
        claimants.len() > 1,
        "expected work split across more than one worker, got {claimants:?}"
    );
}
