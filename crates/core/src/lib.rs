// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! railyard-core: pure domain types for the Railyard engine daemon.
//!
//! No logging, no I/O, no storage dependency — just the entities from spec
//! §3 (`Track`, `WorkItem`, `Dependency`, `ProgressNote`, `Engine`,
//! `Message`, `Session`) and the pure functions over them (status transition
//! validation, cycle detection, error/outcome classification). Every other
//! crate in the workspace depends on this one; this one depends on nothing
//! in the workspace.

pub mod agent_env;
pub mod car;
pub mod clock;
pub mod dependency;
pub mod engine;
pub mod id;
pub mod message;
pub mod outcome;
pub mod progress;
pub mod session;
pub mod time_fmt;
pub mod track;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use car::{WorkItem, WorkItemId, WorkItemStatus, WorkItemType, DEFAULT_PRIORITY, MAX_PRIORITY};
pub use clock::{Clock, FakeClock, SystemClock};
pub use dependency::{would_cycle, Dependency, DependencyType};
pub use engine::{Engine, EngineId, EngineStatus, DEAD_ENGINE_THRESHOLD_MS, HEARTBEAT_INTERVAL_MS};
pub use id::{IdGen, SequentialIdGen, ShortId, ShortTokenIdGen, UuidIdGen};
pub use message::{
    BroadcastAck, Message, MessageId, MessagePriority, SupervisorSignal, ThreadId,
    BROADCAST_RECIPIENT, HUMAN_RECIPIENT,
};
pub use outcome::{Classify, EngineOutcome, ErrorKind, StallReason};
pub use progress::ProgressNote;
pub use session::{Session, SessionId, TokenCounts};
pub use time_fmt::{format_elapsed, format_elapsed_ms};
pub use track::Track;
pub use workspace::WorkspaceStatus;
