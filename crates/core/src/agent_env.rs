// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable names the Subprocess Supervisor exports into every
//! agent subprocess it spawns (spec §6.3 "Subprocess input contract"),
//! letting the agent invoke `railyard complete`/`railyard progress` from
//! inside its worktree without being told the store's location or its own
//! engine id on the command line.

/// Directory holding the WAL and snapshot (`Store`'s `dir`).
pub const STORE_DIR: &str = "RAILYARD_STORE_DIR";
/// `Config::owner`.
pub const OWNER: &str = "RAILYARD_OWNER";
/// `Config::branch_prefix`.
pub const BRANCH_PREFIX: &str = "RAILYARD_BRANCH_PREFIX";
/// `Config::default_branch`.
pub const DEFAULT_BRANCH: &str = "RAILYARD_DEFAULT_BRANCH";
/// The id of the engine that spawned this subprocess.
pub const ENGINE_ID: &str = "RAILYARD_ENGINE_ID";
/// The work item id this subprocess cycle is for.
pub const CAR_ID: &str = "RAILYARD_CAR_ID";
