//! Integration tests for the `switchboardd` binary entry point.
//!
//! Verifies that configuration failures surface on stderr with a non-zero
//! exit before any socket is bound.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn invalid_socket_exits_with_failure() {
    let mut command = cargo_bin_cmd!("switchboardd");
    command.args(["--daemon-socket", "invalid://socket"]);
    command
        .assert()
        .failure()
        .stderr(contains("switchboardd: server bootstrap failed"));
}

#[test]
fn invalid_log_filter_exits_with_failure() {
    let dir = tempfile::tempdir().expect("temporary directory");
    let socket = dir.path().join("switchboardd.sock");
    let mut command = cargo_bin_cmd!("switchboardd");
    command.args([
        "--daemon-socket",
        &format!("unix://{}", socket.display()),
        "--log-filter",
        "[",
    ]);
    command
        .assert()
        .failure()
        .stderr(contains("invalid log filter"));
}
