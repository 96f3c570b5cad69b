// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-engine git worktree management (spec §5: "each engine owns one
//! worktree exclusively; the base repository is shared but only touched
//! under the worktree boundary").
//!
//! This is separate from [`crate::merge_gate`], which operates on the
//! shared base repository directly (branch creation, test gate, merge);
//! this module only ever touches the one worktree directory an `EngineLoop`
//! owns for its whole lifetime.

use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::warn;

use crate::error::EngineError;
use railyard_core::WorkspaceStatus;

/// An engine's exclusive checkout, rooted at `path` on branch `branch`.
pub struct Worktree {
    pub path: PathBuf,
    pub status: WorkspaceStatus,
}

/// Create the worktree at `path` checked out on `branch` if it doesn't
/// already exist. Idempotent: an existing directory is left untouched, since
/// the engine's previous cycle may have left uncommitted or unpushed work in
/// it (spec §4.7 Clear action: "the agent may have left durable state").
pub async fn ensure(repo: &Path, path: &Path, branch: &str) -> Result<Worktree, EngineError> {
    if path.join(".git").exists() {
        return Ok(Worktree {
            path: path.to_path_buf(),
            status: WorkspaceStatus::Ready,
        });
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(EngineError::Io)?;
    }
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["worktree", "add"])
        .arg(path)
        .arg(branch)
        .output()
        .await
        .map_err(EngineError::Io)?;
    if !output.status.success() {
        let reason = String::from_utf8_lossy(&output.stderr).to_string();
        warn!(path = %path.display(), %reason, "worktree creation failed");
        return Err(EngineError::GitFailed(format!(
            "failed to create worktree at {}: {}",
            path.display(),
            reason
        )));
    }
    Ok(Worktree {
        path: path.to_path_buf(),
        status: WorkspaceStatus::Ready,
    })
}

/// Tear down a worktree (Cancelled action, spec §4.7: "release worktree").
/// Best-effort: if `git worktree remove` fails (dirty tree, already
/// detached), fall back to removing the directory so a stale entry doesn't
/// accumulate on disk even if it lingers in git's worktree registry.
pub async fn remove(repo: &Path, path: &Path) -> Result<(), EngineError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["worktree", "remove", "--force"])
        .arg(path)
        .output()
        .await
        .map_err(EngineError::Io)?;
    if !output.status.success() {
        warn!(path = %path.display(), "worktree remove failed, deleting directory directly");
        let _ = tokio::fs::remove_dir_all(path).await;
    }
    Ok(())
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
