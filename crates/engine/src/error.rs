// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the engine loop and its collaborators (supervisor, stall
//! detector, merge gate, scheduler).

use railyard_core::{Classify, ErrorKind};
use railyard_storage::StoreError;
use thiserror::Error;

use crate::supervisor::SupervisorError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("subprocess supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),
    #[error("failed to spawn agent subprocess: {0}")]
    Spawn(std::io::Error),
    #[error("failed to signal agent subprocess: {0}")]
    Signal(nix::Error),
    #[error("agent subprocess io error: {0}")]
    Io(std::io::Error),
    #[error("git command failed: {0}")]
    GitFailed(String),
    #[error("test command failed: {0}")]
    TestFailed(String),
    #[error("merge conflict on {branch} into {base}")]
    MergeConflict { branch: String, base: String },
}

impl Classify for EngineError {
    fn classify(&self) -> ErrorKind {
        match self {
            EngineError::Store(e) => e.classify(),
            EngineError::Supervisor(_) => ErrorKind::TransientIO,
            EngineError::Spawn(_) | EngineError::Io(_) => ErrorKind::TransientIO,
            EngineError::Signal(_) => ErrorKind::TransientIO,
            EngineError::GitFailed(_) | EngineError::TestFailed(_) => ErrorKind::Invalid,
            EngineError::MergeConflict { .. } => ErrorKind::Conflict,
        }
    }
}
