// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-engine reaper (SPEC_FULL.md §4.2): a timer-driven background task
//! that sweeps for engines whose heartbeat has gone stale.
//!
//! `Store::claim` already reaps opportunistically (SPEC_FULL §4.2), which is
//! enough for a single-process test harness where some engine is always
//! about to call `claim`. A real `engine start` deployment can have every
//! engine on a track stuck mid-cycle at once, so `engine start` also spawns
//! this loop to keep dead engines' work items from sitting claimed forever.

use railyard_storage::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How often the sweep runs in production. Well below
/// [`railyard_core::DEAD_ENGINE_THRESHOLD_MS`] (30s) so a dead engine's work
/// is back on the ready queue within a few seconds of crossing the
/// threshold, not up to a full sweep interval late.
pub const REAP_INTERVAL: Duration = Duration::from_secs(10);

/// Spawn the sweep on [`REAP_INTERVAL`]. Send `true` on the returned sender
/// to stop it; dropping the sender also stops it.
pub fn spawn(store: Arc<Store>) -> (JoinHandle<()>, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(run(store, REAP_INTERVAL, rx));
    (handle, tx)
}

/// Run the sweep on `interval` until `shutdown` carries `true` or is dropped.
pub async fn run(store: Arc<Store>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match store.reap_dead_engines() {
                    Ok(reaped) if !reaped.is_empty() => {
                        info!(count = reaped.len(), "reaped dead engines");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "dead-engine sweep failed"),
                }
            }
            result = shutdown.changed() => {
                match result {
                    Ok(()) if *shutdown.borrow() => break,
                    Ok(()) => continue,
                    Err(_) => break,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
