// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace lifecycle status.
//!
//! A workspace is the per-engine git worktree an engine's subprocess runs in
//! (§5: "each engine owns one worktree exclusively").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a workspace in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceStatus {
    /// Worktree is being created (`git worktree add` in progress).
    #[default]
    Creating,
    /// Worktree exists and is checked out on its work item's branch.
    Ready,
    /// Worktree is actively owned by an engine.
    InUse {
        /// Id of the engine using this workspace.
        by: String,
    },
    /// Worktree is being removed (`git worktree remove`).
    Cleaning,
    /// Worktree creation or operation failed.
    Failed {
        /// Reason for the failure.
        reason: String,
    },
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkspaceStatus::Creating => write!(f, "creating"),
            WorkspaceStatus::Ready => write!(f, "ready"),
            WorkspaceStatus::InUse { by } => write!(f, "in_use({})", by),
            WorkspaceStatus::Cleaning => write!(f, "cleaning"),
            WorkspaceStatus::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
