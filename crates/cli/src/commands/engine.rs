// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `engine start` (spec §6.2): run one Engine Loop to termination.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use railyard_config::Config;
use railyard_engine::{spawn_reaper, EngineLoop, EngineLoopConfig};
use railyard_storage::Store;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Args)]
pub struct EngineArgs {
    /// Track to claim work items from
    #[arg(long)]
    pub track: String,
    /// Override the configured poll interval (seconds)
    #[arg(long)]
    pub poll_interval: Option<u64>,
}

pub async fn start(store: Arc<Store>, config: &Config, args: EngineArgs) -> Result<()> {
    let workdir = config.store_dir().join("worktrees");
    let loop_config = EngineLoopConfig {
        track: args.track,
        repo: std::path::PathBuf::from(&config.repo),
        workdir,
        agent_command: config.agent_command().to_string(),
        agent_args: config.agent_args().to_vec(),
        agent_env: config.agent_env(),
        poll_interval: Duration::from_secs(args.poll_interval.unwrap_or(config.poll_interval_sec)),
        shutdown_grace: Duration::from_secs(config.shutdown_grace_sec),
        stall: config.stall,
    };

    let engine_loop = EngineLoop::register(store.clone(), loop_config).await?;
    info!(engine = %engine_loop.id(), "engine registered");

    let (reaper_handle, reaper_stop) = spawn_reaper(store.clone());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(wait_for_signal(cancel_tx));

    let result = engine_loop.run(cancel_rx).await;

    let _ = reaper_stop.send(true);
    let _ = reaper_handle.await;

    Ok(result?)
}

/// Translate SIGINT/SIGTERM into the Engine Loop's cancellation channel
/// (spec §5: "each engine runs in its own process... SIGTERM/SIGINT drain
/// in-flight work before exit").
async fn wait_for_signal(cancel: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => return,
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
    let _ = cancel.send(true);
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
