//! Shared E2E test helpers for `taskdeck` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Address nothing listens on. Tests that reach the network would fail fast.
pub const DEAD_URL: &str = "http://127.0.0.1:9";

const TASKDECK_VARS: &[&str] = &[
    "TASKDECK_DEBUG",
    "TASKDECK_URL",
    "TASKDECK_ANON_KEY",
    "TASKDECK_TIMEOUT_SECS",
    "TASKDECK_LOGIN_PATH",
    "TASKDECK_UNAUTHORIZED_PATH",
    "TASKDECK_SESSION_FILE",
    "TASKDECK_PASSWORD",
    "RUST_LOG",
];

/// Isolated home, project root and session file for one test.
pub struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir for sandbox"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn session_file(&self) -> PathBuf {
        self.path().join("session.json")
    }

    /// Command with no inherited taskdeck configuration.
    pub fn cmd(&self) -> assert_cmd::Command {
        let mut cmd: assert_cmd::Command = cargo_bin_cmd!("taskdeck");
        cmd.timeout(TIMEOUT_BASIC);
        for var in TASKDECK_VARS {
            cmd.env_remove(var);
        }
        cmd.env("HOME", self.path());
        cmd.args([
            "--config",
            self.path().join("config.toml").to_str().expect("valid utf8"),
            "-C",
            self.path().to_str().expect("valid utf8"),
            "--session-file",
            self.session_file().to_str().expect("valid utf8"),
        ]);
        cmd
    }

    /// Command pointed at an unreachable backend.
    pub fn offline_cmd(&self) -> assert_cmd::Command {
        let mut cmd = self.cmd();
        cmd.args(["--url", DEAD_URL, "--anon-key", "test-anon-key"]);
        cmd
    }
}
