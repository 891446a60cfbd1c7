//! `swarmctl bus demo` end to end: wildcard routing observed through the
//! actual binary rather than the in-process `Bus` unit tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn demo_prints_wildcard_and_exact_subscription_feeds() {
    Command::cargo_bin("swarmctl")
        .unwrap()
        .args(["bus", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "task.available",
        ))
        .stdout(predicate::str::contains("task.claimed"))
        .stdout(predicate::str::contains("task.completed"))
        .stdout(predicate::str::contains("build.success").not());
}
