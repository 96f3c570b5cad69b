// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Persistent Store for the Railyard engine daemon (spec §2 PS, §3, §4).
//!
//! An embedded, file-backed transactional store: a write-ahead log of
//! [`Event`]s is the source of truth, [`MaterializedState`] is the
//! in-memory cache rebuilt from the latest [`Snapshot`] plus WAL suffix, and
//! [`Store`] is the facade every other crate calls through — see
//! `SPEC_FULL.md` §3 "Storage representation".

mod event;
mod migration;
mod snapshot;
mod state;
mod store;
mod wal;

pub use event::Event;
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_VERSION};
pub use state::MaterializedState;
pub use store::{
    CreateWorkItem, IdSource, SendMessage, Store, StoreError, WorkItemFilter, WorkItemPatch,
};
pub use wal::{Wal, WalEntry, WalError};
