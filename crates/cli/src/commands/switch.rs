// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `switch` command (spec §6.2): invoke the Merge Gate directly against a
//! work item, for re-running a merge by hand (e.g. after resolving a
//! conflict the engine loop blocked on).

use anyhow::Result;
use clap::Args;
use railyard_core::{Track, WorkItemId};
use railyard_engine::MergeGate;
use railyard_storage::Store;
use std::sync::Arc;

use crate::output::OutputFormat;

#[derive(Args)]
pub struct SwitchArgs {
    /// Work item (car) id
    pub id: String,
    /// Check mergeability (runs the test gate) without moving the base branch
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(store: Arc<Store>, repo: &std::path::Path, args: SwitchArgs, _format: OutputFormat) -> Result<()> {
    let id = WorkItemId::new(args.id);
    let item = store.get(&id)?;
    let track = store
        .get_track(&item.track)?
        .unwrap_or_else(|| Track::new(&item.track, ""));
    let gate = MergeGate::new(store, repo.to_path_buf());
    let outcome = if args.dry_run {
        gate.dry_run(&item, &track, repo).await?
    } else {
        gate.switch(&item, &track, repo).await?
    };

    match outcome {
        railyard_engine::SwitchOutcome::Merged => println!("{} merged into {}", item.branch, item.base_branch),
        railyard_engine::SwitchOutcome::AlreadyMerged => {
            println!("{} already merged into {}", item.branch, item.base_branch)
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "switch_tests.rs"]
mod tests;
