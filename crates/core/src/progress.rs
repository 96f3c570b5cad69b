// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only progress notes attached to a work item.

use crate::car::WorkItemId;
use crate::engine::EngineId;
use serde::{Deserialize, Serialize};

/// One entry in a work item's append-only progress log.
///
/// Notes are never edited or deleted; `cycle` ties a note back to the engine
/// loop iteration (`EngineLoop::cycle_count`) that produced it, so a reader
/// can tell a stale note from a fresh re-attempt apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNote {
    pub work_item_id: WorkItemId,
    pub cycle: u32,
    pub engine_id: EngineId,
    pub note: String,
    pub created_at: i64,
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
