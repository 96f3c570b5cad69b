//! Test helpers for behavioral specifications.
//!
//! Provides a high-level DSL for driving the `railyard` binary as a
//! black box: every spec here shells out to the real CLI against a
//! temporary store, the same way an operator or a wrapper script would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Path to the `railyard` binary built alongside this test binary.
fn railyard_binary() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/railyard");
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("railyard");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// Fluent builder for one `railyard` invocation against a [`Store`].
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: vec![("NO_COLOR".into(), "1".into())],
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    pub fn command(self) -> Command {
        let mut cmd = Command::new(railyard_binary());
        cmd.args(&self.args);
        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }
        // A store's RAILYARD_* env vars must never leak between one
        // Project's store and the next when tests run in the same process
        // environment (they don't by default, but a future runner that
        // reuses env between invocations should not see stale state).
        cmd.env_remove(railyard_core_env::STORE_DIR);
        for (key, value) in self.envs {
            cmd.env(key, value);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }
}

/// Names shared with `railyard_core::agent_env`, duplicated here rather
/// than linked against the crate so this test binary stays a pure
/// black-box client of the `railyard` binary.
mod railyard_core_env {
    pub const STORE_DIR: &str = "RAILYARD_STORE_DIR";
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout())
            .unwrap_or_else(|e| panic!("stdout is not valid JSON: {e}\nstdout: {}", self.stdout()))
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{expected}'\nstdout: {stdout}"
        );
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout should not contain '{unexpected}'\nstdout: {stdout}"
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{expected}'\nstderr: {stderr}"
        );
        self
    }
}

/// A temporary store directory, standing in for a deployed
/// `<store>/wal` + `<store>/snapshot` pair. Every `railyard` invocation
/// against it goes through the `RAILYARD_*` env vars rather than a
/// config file, the same path an agent subprocess uses (spec §6.3).
pub struct Store {
    dir: tempfile::TempDir,
}

impl Store {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Run a `railyard` command against this store.
    pub fn railyard(&self) -> CliBuilder {
        cli()
            .env("RAILYARD_STORE_DIR", self.path())
            .env("RAILYARD_OWNER", "acme")
            .env("RAILYARD_BRANCH_PREFIX", "railyard")
            .env("RAILYARD_DEFAULT_BRANCH", "main")
    }
}

/// A temporary git repository, for specs that exercise `switch` against
/// real branches.
pub struct Repo {
    dir: tempfile::TempDir,
}

impl Repo {
    pub fn init() -> Self {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--initial-branch=main"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["config", "user.name", "Test"]);
        std::fs::write(dir.path().join("README.md"), "seed\n").unwrap();
        git(dir.path(), &["add", "."]);
        git(dir.path(), &["commit", "-m", "seed"]);
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn checkout_new_branch(&self, branch: &str) {
        git(self.path(), &["checkout", "-B", branch]);
    }

    pub fn commit_file(&self, name: &str, content: &str) {
        std::fs::write(self.path().join(name), content).unwrap();
        git(self.path(), &["add", "."]);
        git(self.path(), &["commit", "-m", "work"]);
    }

    pub fn checkout(&self, branch: &str) {
        git(self.path(), &["checkout", branch]);
    }

    pub fn file_in_branch(&self, branch: &str, file: &str) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(["cat-file", "-e", &format!("{branch}:{file}")])
            .status()
            .unwrap()
            .success()
    }
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("git invocation failed");
    assert!(status.success(), "git {args:?} failed");
}
