// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use railyard_config::Config;
use railyard_core::{FakeClock, SequentialIdGen};
use std::time::Duration;
use tempfile::TempDir;

fn test_config(store_dir: &std::path::Path, repo_dir: &std::path::Path) -> Config {
    let yaml = format!(
        "owner: acme\n\
         repo: {repo}\n\
         branch_prefix: railyard\n\
         default_branch: main\n\
         store:\n  database: {store}\n\
         tracks:\n  - name: backend\n    language: rust\n    file_patterns: []\n    engine_slots: 1\n    test_command: \"true\"\n\
         stall:\n  stdout_timeout_sec: 60\n  repeated_error_max: 3\n  max_clear_cycles: 3\n\
         agent:\n  command: \"true\"\n\
         poll_interval_sec: 1\n\
         shutdown_grace_sec: 1\n",
        repo = repo_dir.display(),
        store = store_dir.display(),
    );
    Config::parse(&yaml, "test.yml").unwrap()
}

/// Registers an engine and exercises `run`'s cancellation path directly
/// (rather than through `start`, which owns its own OS signal listener and
/// cannot be handed an externally-controlled cancel channel).
#[tokio::test]
async fn engine_loop_registers_and_shuts_down_on_cancel() {
    let store_dir = TempDir::new().unwrap();
    let repo_dir = TempDir::new().unwrap();
    let config = test_config(store_dir.path(), repo_dir.path());

    let store = Arc::new(
        railyard_storage::Store::with_clock_and_ids(
            store_dir.path(),
            "acme",
            "railyard",
            "main",
            Box::new(FakeClock::new(1_000)),
            Box::new(SequentialIdGen::new("id")),
        )
        .unwrap(),
    );

    let loop_config = railyard_engine::EngineLoopConfig {
        track: "backend".to_string(),
        repo: repo_dir.path().to_path_buf(),
        workdir: store_dir.path().join("worktrees"),
        agent_command: config.agent_command().to_string(),
        agent_args: config.agent_args().to_vec(),
        agent_env: config.agent_env(),
        poll_interval: Duration::from_millis(20),
        shutdown_grace: Duration::from_secs(1),
        stall: config.stall,
    };

    let engine_loop = railyard_engine::EngineLoop::register(store.clone(), loop_config)
        .await
        .unwrap();
    let engine_id = engine_loop.id().clone();

    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(engine_loop.run(cancel_rx));

    // Nothing is ever ready on this track, so the loop just polls; give it
    // one cycle to prove it's alive before asking it to stop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_tx.send(true).unwrap();

    handle.await.unwrap().unwrap();

    // `teardown` deregisters the engine on the way out.
    assert!(store.get_engine(&engine_id).is_err());
}
