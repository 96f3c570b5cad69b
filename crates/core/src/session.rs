// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session entity: one subprocess execution of the agent for a work item.
//!
//! A `Session` exists for the duration of one subprocess invocation driven by
//! the Subprocess Supervisor (§4.5); it is distinct from the `EngineId` of the
//! process that spawned it and the `WorkItemId` it was spawned for.

use crate::car::WorkItemId;
use crate::engine::EngineId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for one subprocess execution.
    pub struct SessionId;
}

/// Token usage reported by the agent subprocess, if it emits any. Both
/// fields default to zero when the subprocess gives no accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Record of one agent subprocess invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub engine_id: EngineId,
    pub car_id: WorkItemId,
    /// OS process id, once spawned. `None` only in the brief window between
    /// record creation and the underlying `spawn()` call returning.
    pub pid: Option<u32>,
    pub started_at: i64,
    pub ended_at: Option<i64>,
    pub exit_code: Option<i32>,
    pub tokens: TokenCounts,
}

impl Session {
    pub fn start(id: SessionId, engine_id: EngineId, car_id: WorkItemId, started_at: i64) -> Self {
        Self {
            id,
            engine_id,
            car_id,
            pid: None,
            started_at,
            ended_at: None,
            exit_code: None,
            tokens: TokenCounts::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
