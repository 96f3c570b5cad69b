// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge Gate (SPEC_FULL.md §4.8): runs the track's test command against a
//! completed work item's branch and merges it into its base branch.
//!
//! `switch`'s git plumbing shells out to `git` via [`tokio::process::Command`]
//! rather than linking a git library, mirroring the subprocess-invocation
//! style used elsewhere in the workspace and treating git as an external
//! collaborator (spec §1 non-goals: "git internals" — beyond the
//! worktree/branch plumbing named explicitly in scope).
//!
//! Base-branch serialization uses [`Store::acquire_base_branch_lock`], the
//! advisory-row analogue of a real row lock keyed by `base_branch` (spec §5
//! "Shared resources").

use railyard_adapters::subprocess::{run_with_timeout, GATE_TIMEOUT};
use railyard_core::{EngineId, MessagePriority, Track, WorkItem, WorkItemId, WorkItemStatus};
use railyard_storage::{SendMessage, Store};
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use tokio::process::Command;

use crate::error::EngineError;

/// Outcome of a `switch` call, distinguishing a fresh merge from the
/// idempotent repeat-call case (spec §4.8: "`switch` is idempotent per work
/// item; repeated calls on an already-merged branch succeed with 'already
/// merged'").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Merged,
    AlreadyMerged,
}

pub struct MergeGate {
    store: Arc<Store>,
    repo: PathBuf,
}

impl MergeGate {
    pub fn new(store: Arc<Store>, repo: impl Into<PathBuf>) -> Self {
        Self {
            store,
            repo: repo.into(),
        }
    }

    /// Engine Loop "Completed" action (spec §4.7) / `complete` CLI command
    /// (spec §4.8 steps 1-5). Transitions the work item to `done`, then
    /// attempts the merge; a conflict blocks the item instead of failing
    /// the whole call.
    pub async fn complete(
        &self,
        id: &WorkItemId,
        engine_id: &EngineId,
        summary: &str,
        track: &Track,
        worktree: &Path,
    ) -> Result<WorkItem, EngineError> {
        let item = self.store.complete(id, engine_id, summary)?;

        match self.switch(&item, track, worktree).await {
            Ok(_) => {
                self.store.unblock_dependents(id)?;
                Ok(item)
            }
            Err(err @ EngineError::MergeConflict { .. }) => {
                self.store.release_work_item(id, WorkItemStatus::Blocked)?;
                self.store.send_message(SendMessage {
                    from_agent: engine_id.as_str().to_string(),
                    to_agent: "supervisor".to_string(),
                    subject: "merge_conflict".to_string(),
                    body: err.to_string(),
                    priority: MessagePriority::Urgent,
                    thread_id: None,
                    car_id: Some(id.clone()),
                })?;
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Run the test gate and merge `item.branch` into `item.base_branch`,
    /// serialized per base branch via the store's advisory lock.
    pub async fn switch(
        &self,
        item: &WorkItem,
        track: &Track,
        worktree: &Path,
    ) -> Result<SwitchOutcome, EngineError> {
        self.store
            .acquire_base_branch_lock(&item.base_branch, &item.branch)?;
        let outcome = self.switch_inner(item, track, worktree).await;
        // Always release, even on failure, so a conflict doesn't wedge the
        // base branch for every other work item targeting it.
        let _ = self.store.release_base_branch_lock(&item.base_branch);
        outcome
    }

    async fn switch_inner(
        &self,
        item: &WorkItem,
        track: &Track,
        worktree: &Path,
    ) -> Result<SwitchOutcome, EngineError> {
        if self.is_ancestor(&item.branch, &item.base_branch).await? {
            return Ok(SwitchOutcome::AlreadyMerged);
        }

        if !item.skip_tests {
            self.run_test_command(&track.test_command, worktree)
                .await?;
        }

        self.fast_forward_merge(&item.branch, &item.base_branch)
            .await?;
        Ok(SwitchOutcome::Merged)
    }

    /// Non-mutating form of [`switch`](Self::switch) for the `switch
    /// --dry-run` CLI command: runs the same test gate and ancestor check
    /// but never moves `base_branch`'s ref.
    pub async fn dry_run(
        &self,
        item: &WorkItem,
        track: &Track,
        worktree: &Path,
    ) -> Result<SwitchOutcome, EngineError> {
        if self.is_ancestor(&item.branch, &item.base_branch).await? {
            return Ok(SwitchOutcome::AlreadyMerged);
        }
        if !item.skip_tests {
            self.run_test_command(&track.test_command, worktree).await?;
        }
        if !self.is_ancestor(&item.base_branch, &item.branch).await? {
            return Err(EngineError::MergeConflict {
                branch: item.branch.clone(),
                base: item.base_branch.clone(),
            });
        }
        Ok(SwitchOutcome::Merged)
    }

    /// Create `branch` off `base_branch` if it doesn't already exist (Engine
    /// Loop step 7, "ensure branch exists"). An existing branch is left as
    /// the engine's worktree may already hold in-progress commits on it from
    /// an earlier cycle — re-claim must not discard that work.
    pub async fn ensure_branch(&self, branch: &str, base_branch: &str) -> Result<(), EngineError> {
        let exists = self
            .git(&["rev-parse", "--verify", "--quiet", branch])
            .await?
            .status
            .success();
        if exists {
            return Ok(());
        }
        let output = self.git(&["branch", branch, base_branch]).await?;
        if !output.status.success() {
            return Err(EngineError::GitFailed(format!(
                "failed to create branch {branch} from {base_branch}: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn is_ancestor(&self, branch: &str, base: &str) -> Result<bool, EngineError> {
        let output = self
            .git(&["merge-base", "--is-ancestor", branch, base])
            .await?;
        Ok(output.status.success())
    }

    async fn run_test_command(&self, test_command: &str, worktree: &Path) -> Result<(), EngineError> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(test_command).current_dir(worktree);
        let output = run_with_timeout(cmd, GATE_TIMEOUT, "track test command")
            .await
            .map_err(EngineError::TestFailed)?;
        if !output.status.success() {
            return Err(EngineError::TestFailed(format!(
                "exit {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    /// Fast-forward `base` to `branch` by moving the ref directly
    /// (`update-ref`, not `checkout`/`merge`), the server-side-automation
    /// idiom for updating a branch nobody has open in a working tree (spec
    /// §4.8 step 4: "fast-forward or three-way merge"). `base` is required
    /// to be an ancestor of `branch`; if it isn't (someone else landed on
    /// `base` since this branch was cut), that's a merge conflict rather
    /// than something this gate resolves on its own.
    async fn fast_forward_merge(&self, branch: &str, base: &str) -> Result<(), EngineError> {
        if !self.is_ancestor(base, branch).await? {
            return Err(EngineError::MergeConflict {
                branch: branch.to_string(),
                base: base.to_string(),
            });
        }
        let rev = self.git(&["rev-parse", branch]).await?;
        if !rev.status.success() {
            return Err(EngineError::GitFailed(format!(
                "failed to resolve {branch} to a commit"
            )));
        }
        let sha = String::from_utf8_lossy(&rev.stdout).trim().to_string();
        let output = self
            .git(&["update-ref", &format!("refs/heads/{base}"), &sha])
            .await?;
        if !output.status.success() {
            return Err(EngineError::GitFailed(format!(
                "failed to fast-forward {base} to {sha}: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    async fn git(&self, args: &[&str]) -> Result<Output, EngineError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo).args(args);
        cmd.output()
            .await
            .map_err(|e| EngineError::GitFailed(e.to_string()))
    }
}

#[cfg(test)]
#[path = "merge_gate_tests.rs"]
mod tests;
