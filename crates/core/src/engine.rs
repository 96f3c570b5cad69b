// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine registry entity: the live-daemon record a track's workers check
//! in under.

use crate::car::WorkItemId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a registered engine.
    pub struct EngineId;
}

/// Engines older than this (no heartbeat) are considered dead and release
/// their claimed work item back to the pool.
pub const DEAD_ENGINE_THRESHOLD_MS: i64 = 30_000;
/// Heartbeat cadence the engine loop is expected to honor.
pub const HEARTBEAT_INTERVAL_MS: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Starting,
    Idle,
    Working,
    Paused,
    Dead,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineStatus::Starting => "starting",
            EngineStatus::Idle => "idle",
            EngineStatus::Working => "working",
            EngineStatus::Paused => "paused",
            EngineStatus::Dead => "dead",
        };
        write!(f, "{s}")
    }
}

/// A live engine process registered against a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub id: EngineId,
    pub track: String,
    pub status: EngineStatus,
    pub current_car: Option<WorkItemId>,
    pub last_activity: i64,
    /// Name of an external overlay index this engine publishes to, if any.
    pub overlay_table: Option<String>,
}

impl Engine {
    pub fn register(id: EngineId, track: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id,
            track: track.into(),
            status: EngineStatus::Starting,
            current_car: None,
            last_activity: now_ms,
            overlay_table: None,
        }
    }

    /// True when `now_ms` is far enough past `last_activity` that this
    /// engine should be treated as dead and its claim released.
    pub fn is_dead_at(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_activity) > DEAD_ENGINE_THRESHOLD_MS
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
