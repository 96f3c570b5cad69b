// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item ("car") identifier and lifecycle state machine.

use crate::engine::EngineId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a work item. An opaque short token, not a
    /// sequence number — it gets embedded in branch names.
    pub struct WorkItemId;
}

/// Kind of work a car represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemType {
    #[default]
    Task,
    Epic,
    Bug,
    Spike,
}

impl fmt::Display for WorkItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItemType::Task => write!(f, "task"),
            WorkItemType::Epic => write!(f, "epic"),
            WorkItemType::Bug => write!(f, "bug"),
            WorkItemType::Spike => write!(f, "spike"),
        }
    }
}

/// Default priority assigned by `create` when none is given.
pub const DEFAULT_PRIORITY: u8 = 2;
/// Highest valid priority value (0 is most urgent).
pub const MAX_PRIORITY: u8 = 4;

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Draft,
    Open,
    Claimed,
    InProgress,
    Blocked,
    Done,
    Cancelled,
}

impl WorkItemStatus {
    /// Whether `self -> next` is a legal transition per the work item state
    /// machine. Terminal statuses (`done`, `cancelled`) accept no transition,
    /// including into themselves — callers treat a repeat `cancelled`
    /// transition as a no-op rather than calling this.
    pub fn can_transition_to(self, next: WorkItemStatus) -> bool {
        use WorkItemStatus::*;
        matches!(
            (self, next),
            (Draft, Open)
                | (Open, Claimed)
                | (Open, Cancelled)
                | (Claimed, InProgress)
                | (Claimed, Blocked)
                | (Claimed, Open)
                | (InProgress, Done)
                | (InProgress, Blocked)
                | (InProgress, Claimed)
                | (Blocked, Open)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkItemStatus::Done | WorkItemStatus::Cancelled)
    }
}

impl fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkItemStatus::Draft => "draft",
            WorkItemStatus::Open => "open",
            WorkItemStatus::Claimed => "claimed",
            WorkItemStatus::InProgress => "in_progress",
            WorkItemStatus::Blocked => "blocked",
            WorkItemStatus::Done => "done",
            WorkItemStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// A unit of work claimed and executed by one engine at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub title: String,
    pub item_type: WorkItemType,
    /// 0 (highest) through [`MAX_PRIORITY`].
    pub priority: u8,
    pub status: WorkItemStatus,
    pub claimed_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub track: String,
    pub branch: String,
    pub base_branch: String,
    pub parent_id: Option<WorkItemId>,
    pub description: String,
    pub acceptance_criteria: String,
    pub design_notes: String,
    pub assignee: Option<EngineId>,
    /// Run the track's test command before completing, unless set.
    pub skip_tests: bool,
    pub created_at: i64,
    /// Number of times this car has produced a Clear outcome since its
    /// last Completed/Stall transition. Reset on any non-Clear outcome.
    pub cycle_count: u32,
}

impl WorkItem {
    /// True once the status/assignee pair satisfies the claimed-work
    /// invariant: claimed or in-progress work always names its engine.
    pub fn invariant_has_assignee(&self) -> bool {
        match self.status {
            WorkItemStatus::Claimed | WorkItemStatus::InProgress => self.assignee.is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
#[path = "car_tests.rs"]
mod tests;
