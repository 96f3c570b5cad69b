// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
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

#[tokio::test]
async fn ensure_creates_a_worktree_on_a_new_branch() {
    let repo = init_repo();
    let target = TempDir::new().unwrap();
    let wt_path = target.path().join("engine-1");

    let wt = ensure(repo.path(), &wt_path, "railyard/acme/backend/a1")
        .await
        .unwrap();

    assert!(wt.path.join("README.md").exists());
    assert!(wt.path.join(".git").exists());
    assert_eq!(wt.status, railyard_core::WorkspaceStatus::Ready);
}

#[tokio::test]
async fn ensure_is_idempotent_on_an_existing_worktree() {
    let repo = init_repo();
    let target = TempDir::new().unwrap();
    let wt_path = target.path().join("engine-1");

    ensure(repo.path(), &wt_path, "railyard/acme/backend/a1")
        .await
        .unwrap();
    std::fs::write(wt_path.join("scratch.txt"), "durable state\n").unwrap();

    ensure(repo.path(), &wt_path, "railyard/acme/backend/a1")
        .await
        .unwrap();

    assert!(wt_path.join("scratch.txt").exists());
}

#[tokio::test]
async fn remove_deletes_the_worktree_directory() {
    let repo = init_repo();
    let target = TempDir::new().unwrap();
    let wt_path = target.path().join("engine-1");

    ensure(repo.path(), &wt_path, "railyard/acme/backend/a1")
        .await
        .unwrap();
    remove(repo.path(), &wt_path).await.unwrap();

    assert!(!wt_path.exists());
}
