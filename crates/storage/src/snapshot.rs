// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot
//! and replays WAL entries after that sequence. Snapshot bodies are
//! zstd-compressed JSON; a `version` field lets [`crate::migration`]
//! upgrade a snapshot written by an older build before it is deserialized
//! into the current [`MaterializedState`] shape.

use crate::migration::MigrationRegistry;
use crate::MaterializedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Current on-disk snapshot schema version.
pub const CURRENT_VERSION: u32 = 1;

/// zstd compression level used for snapshot bodies. Low: snapshots are
/// written far more often than they're shipped anywhere, so save latency
/// matters more than ratio.
const COMPRESSION_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] crate::migration::MigrationError),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// On-disk schema version this snapshot was written with.
    pub version: u32,
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The complete materialized state
    pub state: MaterializedState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a new snapshot.
    pub fn new(seq: u64, state: MaterializedState) -> Self {
        Self {
            version: CURRENT_VERSION,
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Save snapshot atomically (write to .tmp, then rename).
    ///
    /// This ensures that a crash during save won't corrupt the snapshot file.
    /// The body is JSON, then zstd-compressed.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL)?;

        // Write to temp file and sync
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&compressed)?;
            file.sync_all()?;
        }

        // Atomic rename
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load snapshot if it exists, migrating it to [`CURRENT_VERSION`] first.
    ///
    /// Returns `Ok(None)` if the file doesn't exist or is corrupt.
    /// Corrupt snapshots are moved to a `.bak` file so the caller can
    /// recover via WAL replay from an empty state instead.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        Self::load_with_migrations(path, &MigrationRegistry::default())
    }

    /// Load a snapshot, applying `registry`'s migrations to any versioned
    /// JSON value before deserializing into the current [`Snapshot`] shape.
    pub fn load_with_migrations(
        path: &Path,
        registry: &MigrationRegistry,
    ) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let mut compressed = Vec::new();
        File::open(path)?.read_to_end(&mut compressed)?;

        let decoded = match zstd::decode_all(compressed.as_slice()) {
            Ok(d) => d,
            Err(e) => return Ok(Self::quarantine(path, &e.to_string())?),
        };

        let value: serde_json::Value = match serde_json::from_slice(&decoded) {
            Ok(v) => v,
            Err(e) => return Ok(Self::quarantine(path, &e.to_string())?),
        };

        let migrated = registry.migrate(value)?;

        match serde_json::from_value(migrated) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => Self::quarantine(path, &e.to_string()),
        }
    }

    fn quarantine(path: &Path, reason: &str) -> Result<Option<Self>, SnapshotError> {
        let bak_path = rotate_bak_path(path);
        warn!(
            error = reason,
            path = %path.display(),
            bak = %bak_path.display(),
            "Corrupt snapshot, moving to .bak and starting fresh",
        );
        fs::rename(path, &bak_path)?;
        Ok(None)
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    // Remove the oldest if at capacity
    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    // Shift existing backups up by one
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
