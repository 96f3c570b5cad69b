// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-sourcing log entries: the facts appended to the WAL.
//!
//! Every mutation the Persistent Store makes is expressed as an `Event`
//! before it is applied to [`crate::state::MaterializedState`] and appended
//! to the write-ahead log. Replaying the event log from an empty state
//! reproduces the current state exactly (§3 "Storage representation").

use railyard_core::{
    DependencyType, EngineId, EngineStatus, MessageId, MessagePriority, SessionId, ThreadId,
    Track, WorkItemId, WorkItemStatus, WorkItemType,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    TrackSeeded {
        track: Track,
    },
    WorkItemCreated {
        id: WorkItemId,
        title: String,
        item_type: WorkItemType,
        priority: u8,
        track: String,
        branch: String,
        base_branch: String,
        parent_id: Option<WorkItemId>,
        description: String,
        acceptance_criteria: String,
        design_notes: String,
        skip_tests: bool,
        status: WorkItemStatus,
        created_at: i64,
    },
    WorkItemStatusChanged {
        id: WorkItemId,
        status: WorkItemStatus,
        at: i64,
    },
    WorkItemAssigned {
        id: WorkItemId,
        engine_id: EngineId,
        at: i64,
    },
    WorkItemReleased {
        id: WorkItemId,
        at: i64,
    },
    WorkItemFieldsUpdated {
        id: WorkItemId,
        title: Option<String>,
        description: Option<String>,
        acceptance_criteria: Option<String>,
        design_notes: Option<String>,
        priority: Option<u8>,
        skip_tests: Option<bool>,
    },
    WorkItemCompleted {
        id: WorkItemId,
        at: i64,
    },
    WorkItemCycleIncremented {
        id: WorkItemId,
    },
    WorkItemCycleReset {
        id: WorkItemId,
    },
    DependencyAdded {
        work_item_id: WorkItemId,
        blocked_by: WorkItemId,
        dep_type: DependencyType,
    },
    DependencyRemoved {
        work_item_id: WorkItemId,
        blocked_by: WorkItemId,
    },
    ProgressNoteAdded {
        work_item_id: WorkItemId,
        cycle: u32,
        engine_id: String,
        note: String,
        created_at: i64,
    },
    EngineRegistered {
        id: EngineId,
        track: String,
        at: i64,
    },
    EngineHeartbeat {
        id: EngineId,
        at: i64,
        status: EngineStatus,
    },
    EngineStatusChanged {
        id: EngineId,
        status: EngineStatus,
    },
    EngineCurrentCarChanged {
        id: EngineId,
        current_car: Option<WorkItemId>,
    },
    EngineDeregistered {
        id: EngineId,
    },
    MessageSent {
        id: MessageId,
        from_agent: String,
        to_agent: String,
        subject: String,
        body: String,
        priority: MessagePriority,
        thread_id: Option<ThreadId>,
        car_id: Option<WorkItemId>,
        created_at: i64,
    },
    MessageAcknowledged {
        id: MessageId,
    },
    BroadcastAcknowledged {
        id: MessageId,
        recipient: String,
    },
    SessionStarted {
        id: SessionId,
        engine_id: EngineId,
        car_id: WorkItemId,
        started_at: i64,
    },
    SessionPidAssigned {
        id: SessionId,
        pid: u32,
    },
    SessionEnded {
        id: SessionId,
        ended_at: i64,
        exit_code: Option<i32>,
    },
    BaseBranchLockAcquired {
        base_branch: String,
        holder: String,
    },
    BaseBranchLockReleased {
        base_branch: String,
    },
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
