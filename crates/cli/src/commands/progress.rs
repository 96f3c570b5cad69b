// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `progress` command (spec §6.2): append a progress note from inside the
//! agent subprocess without transitioning the work item.

use anyhow::Result;
use clap::Args;
use railyard_core::WorkItemId;
use railyard_storage::Store;

use crate::output::{emit, OutputFormat};

#[derive(Args)]
pub struct ProgressArgs {
    /// Work item (car) id
    pub id: String,
    /// Free-text note
    pub note: String,
}

pub fn run(store: &Store, args: ProgressArgs, format: OutputFormat) -> Result<()> {
    let id = WorkItemId::new(args.id);
    let engine_id =
        std::env::var(railyard_core::agent_env::ENGINE_ID).unwrap_or_else(|_| "unknown".to_string());
    let item = store.get(&id)?;
    let note = store.add_progress_note(&id, &engine_id, item.cycle_count, &args.note)?;
    emit(format, &note, |note| {
        println!("[cycle {}] {}", note.cycle, note.note);
    });
    Ok(())
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
