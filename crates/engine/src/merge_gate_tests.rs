// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use railyard_core::{FakeClock, SequentialIdGen};
use railyard_storage::CreateWorkItem;
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn git(repo: &Path, args: &[&str]) {
    let status = StdCommand::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .status()
        .expect("git invocation failed");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test"]);
    std::fs::write(dir.path().join("README.md"), "seed\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "seed"]);
    dir
}

fn open_store(dir: &Path) -> Store {
    Store::with_clock_and_ids(
        dir,
        "acme",
        "railyard",
        "main",
        Box::new(FakeClock::new(1_000)),
        Box::new(SequentialIdGen::new("id")),
    )
    .unwrap()
}

fn default_track() -> Track {
    Track::new("backend", "rust")
}

/// Commit one file onto `branch` (creating it from the current HEAD if it
/// doesn't exist), leaving the repo checked out back on its previous branch.
fn commit_on_branch(repo: &Path, branch: &str, file: &str) {
    git(repo, &["checkout", "-B", branch]);
    std::fs::write(repo.join(file), "content\n").unwrap();
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", &format!("work on {branch}")]);
    git(repo, &["checkout", "main"]);
}

/// Whether `file` exists in `branch`'s tree, checked via the object database
/// rather than the working tree — `fast_forward_merge` moves refs with
/// `update-ref` and never touches whatever happens to be checked out.
fn file_in_branch(repo: &Path, branch: &str, file: &str) -> bool {
    StdCommand::new("git")
        .arg("-C")
        .arg(repo)
        .args(["cat-file", "-e", &format!("{branch}:{file}")])
        .status()
        .unwrap()
        .success()
}

#[tokio::test]
async fn switch_fast_forwards_a_clean_branch() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let item = store
        .create(CreateWorkItem {
            title: "A".to_string(),
            track: "backend".to_string(),
            skip_tests: true,
            ..Default::default()
        })
        .unwrap();
    commit_on_branch(repo.path(), &item.branch, "a.txt");

    let gate = MergeGate::new(store, repo.path());
    let outcome = gate
        .switch(&item, &default_track(), repo.path())
        .await
        .unwrap();
    assert_eq!(outcome, SwitchOutcome::Merged);
    assert!(file_in_branch(repo.path(), "main", "a.txt"));
}

#[tokio::test]
async fn switch_is_idempotent_once_merged() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let item = store
        .create(CreateWorkItem {
            title: "A".to_string(),
            track: "backend".to_string(),
            skip_tests: true,
            ..Default::default()
        })
        .unwrap();
    commit_on_branch(repo.path(), &item.branch, "a.txt");

    let gate = MergeGate::new(store, repo.path());
    let first = gate.switch(&item, &default_track(), repo.path()).await.unwrap();
    assert_eq!(first, SwitchOutcome::Merged);

    let second = gate.switch(&item, &default_track(), repo.path()).await.unwrap();
    assert_eq!(second, SwitchOutcome::AlreadyMerged);
}

#[tokio::test]
async fn switch_runs_test_command_before_merging() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let item = store
        .create(CreateWorkItem {
            title: "A".to_string(),
            track: "backend".to_string(),
            skip_tests: false,
            ..Default::default()
        })
        .unwrap();
    commit_on_branch(repo.path(), &item.branch, "a.txt");

    let mut track = default_track();
    track.test_command = "true".to_string();

    let gate = MergeGate::new(store, repo.path());
    let outcome = gate.switch(&item, &track, repo.path()).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Merged);
}

#[tokio::test]
async fn switch_fails_and_leaves_base_untouched_when_tests_fail() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let item = store
        .create(CreateWorkItem {
            title: "A".to_string(),
            track: "backend".to_string(),
            skip_tests: false,
            ..Default::default()
        })
        .unwrap();
    commit_on_branch(repo.path(), &item.branch, "a.txt");

    let mut track = default_track();
    track.test_command = "false".to_string();

    let gate = MergeGate::new(store, repo.path());
    let err = gate
        .switch(&item, &track, repo.path())
        .await
        .expect_err("failing test command should surface as an error");
    assert!(matches!(err, EngineError::TestFailed(_)));
    assert!(!file_in_branch(repo.path(), "main", "a.txt"));
}

#[tokio::test]
async fn switch_reports_conflict_when_base_has_diverged() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let item = store
        .create(CreateWorkItem {
            title: "A".to_string(),
            track: "backend".to_string(),
            skip_tests: true,
            ..Default::default()
        })
        .unwrap();
    commit_on_branch(repo.path(), &item.branch, "a.txt");

    // Advance main independently so the car branch is no longer a
    // fast-forward ancestor relationship in the right direction.
    std::fs::write(repo.path().join("main-only.txt"), "x\n").unwrap();
    git(repo.path(), &["add", "."]);
    git(repo.path(), &["commit", "-m", "unrelated main progress"]);

    let gate = MergeGate::new(store, repo.path());
    let err = gate
        .switch(&item, &default_track(), repo.path())
        .await
        .expect_err("diverged base should be a merge conflict");
    assert!(matches!(err, EngineError::MergeConflict { .. }));
}

#[tokio::test]
async fn ensure_branch_creates_when_missing() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    let gate = MergeGate::new(store, repo.path());

    gate.ensure_branch("railyard/acme/backend/new", "main")
        .await
        .unwrap();

    let exists = StdCommand::new("git")
        .arg("-C")
        .arg(repo.path())
        .args(["rev-parse", "--verify", "railyard/acme/backend/new"])
        .status()
        .unwrap()
        .success();
    assert!(exists);
}

#[tokio::test]
async fn ensure_branch_leaves_existing_branch_untouched() {
    let repo = init_repo();
    let store_dir = TempDir::new().unwrap();
    let store = Arc::new(open_store(store_dir.path()));
    commit_on_branch(repo.path(), "railyard/acme/backend/existing", "a.txt");

    let gate = MergeGate::new(store, repo.path());
    gate.ensure_branch("railyard/acme/backend/existing", "main")
        .await
        .unwrap();

    let output = StdCommand::new("git")
        .arg("-C")
        .arg(repo.path())
        .args(["rev-parse", "railyard/acme/backend/existing"])
        .output()
        .unwrap();
    let sha = String::from_utf8_lossy(&output.stdout);
    assert!(!sha.trim().is_empty());
}
