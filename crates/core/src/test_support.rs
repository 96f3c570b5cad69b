// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test factories for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`. These build
//! entities with sane defaults so storage/engine/cli tests don't each
//! reinvent a fifteen-field `WorkItem` literal.

use crate::car::{WorkItem, WorkItemId, WorkItemStatus, WorkItemType, DEFAULT_PRIORITY};
use crate::engine::{Engine, EngineId, EngineStatus};
use crate::message::{Message, MessageId, MessagePriority};
use crate::progress::ProgressNote;
use crate::session::{Session, SessionId, TokenCounts};
use std::collections::HashMap;

/// A minimal, valid `open` work item on track `backend`.
pub fn work_item(id: &str) -> WorkItem {
    WorkItem {
        id: WorkItemId::new(id),
        title: format!("work item {id}"),
        item_type: WorkItemType::Task,
        priority: DEFAULT_PRIORITY,
        status: WorkItemStatus::Open,
        claimed_at: None,
        completed_at: None,
        track: "backend".to_string(),
        branch: format!("railyard/acme/backend/{id}"),
        base_branch: "main".to_string(),
        parent_id: None,
        description: String::new(),
        acceptance_criteria: String::new(),
        design_notes: String::new(),
        assignee: None,
        skip_tests: false,
        created_at: 0,
        cycle_count: 0,
    }
}

/// A freshly-registered engine on track `backend`.
pub fn engine(id: &str) -> Engine {
    Engine::register(EngineId::new(id), "backend", 0)
}

/// A registered, working engine already assigned to `car_id`.
pub fn working_engine(id: &str, car_id: &str, now_ms: i64) -> Engine {
    Engine {
        status: EngineStatus::Working,
        current_car: Some(WorkItemId::new(car_id)),
        last_activity: now_ms,
        ..Engine::register(EngineId::new(id), "backend", now_ms)
    }
}

/// A direct, normal-priority message.
pub fn message(id: &str, from: &str, to: &str, subject: &str, body: &str) -> Message {
    Message {
        id: MessageId::new(id),
        from_agent: from.to_string(),
        to_agent: to.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        priority: MessagePriority::Normal,
        thread_id: None,
        car_id: None,
        acknowledged: false,
        created_at: 0,
    }
}

pub fn progress_note(car_id: &str, engine_id: &str, cycle: u32, note: &str) -> ProgressNote {
    ProgressNote {
        work_item_id: WorkItemId::new(car_id),
        cycle,
        engine_id: EngineId::new(engine_id),
        note: note.to_string(),
        created_at: 0,
    }
}

pub fn session(id: &str, engine_id: &str, car_id: &str, started_at: i64) -> Session {
    Session {
        id: SessionId::new(id),
        engine_id: EngineId::new(engine_id),
        car_id: WorkItemId::new(car_id),
        pid: Some(4242),
        started_at,
        ended_at: None,
        exit_code: None,
        tokens: TokenCounts::default(),
    }
}

/// Track conventions map with a couple of representative entries, for tests
/// that render a context payload.
pub fn conventions() -> HashMap<String, String> {
    [("style".to_string(), "rustfmt".to_string())]
        .into_iter()
        .collect()
}
