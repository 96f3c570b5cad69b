// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim Scheduler (SPEC_FULL.md §4.4): hands a ready work item to a calling
//! engine with at-most-once semantics.
//!
//! The actual atomicity lives in [`railyard_storage::Store::claim`] (the
//! whole-store advisory lock stands in for "SELECT ... FOR UPDATE SKIP
//! LOCKED"); this module is the Engine Loop-facing wrapper that turns the
//! store's `NotFound` into the "nothing ready, sleep and retry" case spec
//! §4.4/§4.7 step 5 describes, rather than an error the loop has to inspect.

use railyard_core::{Classify, EngineId, ErrorKind, WorkItem};
use railyard_storage::Store;
use std::sync::Arc;

use crate::error::EngineError;

/// Thin wrapper over [`Store`]'s claim operations for one engine loop.
pub struct Scheduler {
    store: Arc<Store>,
}

impl Scheduler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Spec §4.4 `claim_or_reclaim`. Returns `Ok(None)` when nothing is
    /// ready on `track` (the `NotFound` case the loop sleeps on), and
    /// propagates every other error as-is.
    pub fn claim_or_reclaim(
        &self,
        engine_id: &EngineId,
        track: &str,
    ) -> Result<Option<WorkItem>, EngineError> {
        match self.store.claim_or_reclaim(engine_id, track) {
            Ok(item) => Ok(Some(item)),
            Err(e) if e.classify() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
