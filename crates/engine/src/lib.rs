// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Railyard execution engine: the Claim Scheduler, Subprocess Supervisor,
//! Stall Detector, Merge Gate, worktree manager, dead-engine Reaper, and the
//! Engine Loop that drives them together (SPEC_FULL.md §4.4-§4.8).

mod engine_loop;
mod error;
mod merge_gate;
mod reaper;
mod scheduler;
mod stall;
mod supervisor;
mod worktree;

pub use engine_loop::{EngineLoop, EngineLoopConfig};
pub use error::EngineError;
pub use merge_gate::{MergeGate, SwitchOutcome};
pub use reaper::{spawn as spawn_reaper, REAP_INTERVAL};
pub use scheduler::Scheduler;
pub use stall::StallDetector;
pub use supervisor::{spawn as spawn_agent, Spawned, SupervisorError};
pub use worktree::{ensure as ensure_worktree, remove as remove_worktree, Worktree};
