// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `complete` command (spec §6.2, §4.8 steps 1-5): the contract the agent
//! subprocess uses to produce the "Completed" outcome — mutates the store
//! directly and runs the merge gate, rather than waiting on the Engine Loop
//! to notice exit 0.

use anyhow::Result;
use clap::Args;
use railyard_core::{EngineId, Track, WorkItemId};
use railyard_engine::MergeGate;
use railyard_storage::Store;
use std::sync::Arc;

use crate::output::{emit, OutputFormat};

#[derive(Args)]
pub struct CompleteArgs {
    /// Work item (car) id being completed
    pub id: String,
    /// One-line progress note recorded alongside the completion
    pub summary: String,
}

pub async fn run(store: Arc<Store>, args: CompleteArgs, format: OutputFormat) -> Result<()> {
    let id = WorkItemId::new(args.id);
    let engine_id = EngineId::new(
        std::env::var(railyard_core::agent_env::ENGINE_ID).unwrap_or_else(|_| "unknown".to_string()),
    );
    let item = store.get(&id)?;
    let track = store
        .get_track(&item.track)?
        .unwrap_or_else(|| Track::new(&item.track, ""));
    let worktree = std::env::current_dir()?;

    let gate = MergeGate::new(store, worktree.clone());
    let item = gate
        .complete(&id, &engine_id, &args.summary, &track, &worktree)
        .await?;

    emit(format, &item, |item| {
        println!("{} -> {}", item.id, item.status);
    });
    Ok(())
}

#[cfg(test)]
#[path = "complete_tests.rs"]
mod tests;
