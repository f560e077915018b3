//! E2E integration tests for the `taskdeck` binary.
//!
//! None of these reach a backend: they cover argument parsing, configuration
//! and the route guard decisions that happen before any request.

mod common;

use common::Sandbox;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

// ─── Help / Parsing ────────────────────────────────────────────────

#[test]
fn help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("login"))
        .stdout(contains("whoami"))
        .stdout(contains("projects"))
        .stdout(contains("tasks"))
        .stdout(contains("comments"))
        .stdout(contains("users"));
}

#[test]
fn invalid_task_status_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .args([
            "tasks",
            "status",
            "6f1c1a7e-1d0b-4a59-9a53-2f0f2c1f6a11",
            "done",
        ])
        .assert()
        .failure()
        .stderr(contains("unknown task status"));
}

#[test]
fn comment_parent_is_required() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .args(["comments", "list"])
        .assert()
        .failure()
        .stderr(contains("--task").or(contains("--project")));
}

// ─── Configuration ─────────────────────────────────────────────────

#[test]
fn missing_backend_url_is_config_error() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("whoami")
        .assert()
        .failure()
        .stderr(contains("backend.url"));
}

#[test]
fn url_from_global_config_file() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.path().join("config.toml"),
        "[backend]\nurl = \"http://127.0.0.1:9\"\nanon_key = \"k\"\n",
    )
    .expect("write config");
    sandbox
        .cmd()
        .arg("whoami")
        .assert()
        .code(2)
        .stderr(contains("Redirecting to /login"));
}

// ─── Route Guard ───────────────────────────────────────────────────

#[test]
fn signed_out_whoami_redirects_to_login() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .arg("whoami")
        .assert()
        .code(2)
        .stderr(contains("Redirecting to /login"))
        .stderr(contains("taskdeck login"));
}

#[test]
fn signed_out_admin_command_redirects_to_login() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .args(["users", "list"])
        .assert()
        .code(2)
        .stderr(contains("Redirecting to /login"))
        .stderr(contains("admin role").not());
}

#[test]
fn project_scoped_commands_reach_the_guard() {
    let sandbox = Sandbox::new();
    let id = "6f1c1a7e-1d0b-4a59-9a53-2f0f2c1f6a11";
    for args in [
        ["tasks", "list", "--project", id],
        ["comments", "list", "--project", id],
    ] {
        sandbox
            .offline_cmd()
            .args(args)
            .assert()
            .code(2)
            .stderr(contains("Redirecting to /login"))
            .stderr(contains("panicked").not());
    }
}

#[test]
fn login_route_is_configurable() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .env("TASKDECK_LOGIN_PATH", "/signin")
        .args(["projects", "list"])
        .assert()
        .code(2)
        .stderr(contains("Redirecting to /signin"));
}

#[test]
fn malformed_session_file_is_treated_as_signed_out() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.session_file(), "{ not json").expect("write session file");
    sandbox
        .offline_cmd()
        .arg("whoami")
        .assert()
        .code(2)
        .stderr(contains("Redirecting to /login"));
}

#[test]
fn logout_without_session_succeeds() {
    let sandbox = Sandbox::new();
    sandbox
        .offline_cmd()
        .arg("logout")
        .assert()
        .success()
        .stdout(contains("Signed out"));
    assert!(!sandbox.session_file().exists());
}
