// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O the Railyard core treats as collaborators
//! (spec §1: "everything else ... is thin glue that drives or reports on
//! this core").
//!
//! `session` is optional pane-display glue (tmux) a dashboard or operator
//! can use to watch an engine's subprocess; it is distinct from the
//! Subprocess Supervisor's canonical data path, which `railyard-engine`
//! builds directly on `tokio::process::Command` (SPEC_FULL.md §4.5).

pub mod session;
pub mod subprocess;

pub use session::{NoOpSessionAdapter, SessionAdapter, TmuxAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSession, FakeSessionAdapter, SessionCall};
