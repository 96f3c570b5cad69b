// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine Loop (SPEC_FULL.md §4.7): the per-engine state machine that drives
//! the Claim Scheduler, Subprocess Supervisor, Stall Detector and Merge Gate
//! through one work item at a time.
//!
//! One [`EngineLoop`] corresponds to one `engine start` process (spec §5:
//! "each engine runs in its own process"). `run` owns the loop; a heartbeat
//! task runs alongside it reporting liveness to the store every
//! [`railyard_core::HEARTBEAT_INTERVAL_MS`], and signals the main loop over
//! a `watch` channel on failure (step 2: "Check heartbeat channel → on
//! error, Shutdown").

use std::path::PathBuf;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use railyard_config::StallConfig;
use railyard_core::{
    Classify, Engine, EngineId, EngineStatus, ErrorKind, Message, MessagePriority, StallReason,
    SupervisorSignal, Track, WorkItem, WorkItemId, WorkItemStatus, HEARTBEAT_INTERVAL_MS,
};
use railyard_storage::{SendMessage, Store};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::merge_gate::MergeGate;
use crate::scheduler::Scheduler;
use crate::stall::StallDetector;
use crate::supervisor;
use crate::worktree;

/// Static configuration for one [`EngineLoop`] instance, assembled from
/// [`railyard_config::Config`] plus the `engine start` CLI flags.
pub struct EngineLoopConfig {
    pub track: String,
    pub repo: PathBuf,
    /// Directory this engine's exclusive worktree is rooted at.
    pub workdir: PathBuf,
    pub agent_command: String,
    pub agent_args: Vec<String>,
    pub agent_env: Vec<(String, String)>,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub stall: StallConfig,
}

/// Outcome of one full claim-spawn-wait cycle (engine_loop-internal;
/// extends the spec §4.7 outcome table with `Aborted`, the effect of a
/// supervisor abort message arriving mid-session — see `DESIGN.md` for why
/// this isn't folded into [`railyard_core::EngineOutcome`]).
enum CycleOutcome {
    Completed(i32),
    Clear(i32),
    Stall(StallReason),
    Aborted { hard: bool },
    Shutdown,
}

/// The per-engine orchestrator (spec §4.7). Owns no cross-engine state: all
/// coordination happens through `store`.
pub struct EngineLoop {
    store: Arc<Store>,
    scheduler: Scheduler,
    merge_gate: MergeGate,
    config: EngineLoopConfig,
    engine: Engine,
    /// The work item this loop currently holds the claim for, tracked
    /// locally since `engine` is a point-in-time snapshot from `register`
    /// that is never refetched from the store.
    current_car: Option<WorkItemId>,
    cycle_count: u32,
    pause_flag: bool,
    status: Arc<AsyncMutex<EngineStatus>>,
    heartbeat_failed: Arc<AtomicBool>,
    heartbeat_handle: Option<JoinHandle<()>>,
    heartbeat_stop: Option<watch::Sender<bool>>,
}

impl EngineLoop {
    /// Register a new engine on `config.track` and start its heartbeat task.
    pub async fn register(store: Arc<Store>, config: EngineLoopConfig) -> Result<Self, EngineError> {
        let engine = store.register_engine(&config.track)?;
        let status = Arc::new(AsyncMutex::new(EngineStatus::Starting));
        let heartbeat_failed = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_heartbeat(
            store.clone(),
            engine.id.clone(),
            status.clone(),
            heartbeat_failed.clone(),
            stop_rx,
        ));

        Ok(Self {
            merge_gate: MergeGate::new(store.clone(), config.repo.clone()),
            scheduler: Scheduler::new(store.clone()),
            store,
            config,
            engine,
            current_car: None,
            cycle_count: 0,
            pause_flag: false,
            status,
            heartbeat_failed,
            heartbeat_handle: Some(handle),
            heartbeat_stop: Some(stop_tx),
        })
    }

    pub fn id(&self) -> &EngineId {
        &self.engine.id
    }

    async fn set_status(&self, status: EngineStatus) -> Result<(), EngineError> {
        *self.status.lock().await = status;
        self.store.set_engine_status(&self.engine.id, status)?;
        Ok(())
    }

    /// Run until `cancel` carries `true` (SIGINT/SIGTERM, spec §5) or a
    /// `Fatal`/heartbeat error terminates the loop.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> Result<(), EngineError> {
        self.set_status(EngineStatus::Idle).await?;

        let outcome = loop {
            if *cancel.borrow() {
                break None;
            }
            if self.heartbeat_failed.load(Ordering::SeqCst) {
                warn!(engine = %self.engine.id, "heartbeat failed, shutting down");
                break None;
            }

            let inbox_result = self.process_inbox();
            let keep_going = match inbox_result {
                Ok(keep_going) => keep_going,
                Err(err) if err.classify() == ErrorKind::Fatal => break Some(err),
                Err(err) => {
                    warn!(engine = %self.engine.id, error = %err, "recoverable error processing inbox, continuing");
                    true
                }
            };
            if !keep_going {
                // A hard abort of the engine's own current work item while
                // idle still just releases the item; only cancellation ends
                // the loop, so this branch is unreachable today but kept for
                // a future supervisor-directed shutdown signal.
                break None;
            }

            if self.pause_flag {
                if sleep_or_cancel(self.config.poll_interval, &mut cancel).await {
                    break None;
                }
                continue;
            }

            let claim_result = self
                .scheduler
                .claim_or_reclaim(&self.engine.id, &self.config.track);
            let item = match claim_result {
                Ok(Some(item)) => item,
                Ok(None) => {
                    if sleep_or_cancel(self.config.poll_interval, &mut cancel).await {
                        break None;
                    }
                    continue;
                }
                Err(err) if err.classify() == ErrorKind::Fatal => break Some(err),
                Err(err) => {
                    warn!(engine = %self.engine.id, error = %err, "recoverable error claiming work, retrying");
                    if sleep_or_cancel(self.config.poll_interval, &mut cancel).await {
                        break None;
                    }
                    continue;
                }
            };

            self.cycle_count += 1;
            self.current_car = Some(item.id.clone());
            match self.run_one_cycle(item, &mut cancel).await {
                Ok(CycleOutcome::Shutdown) => break None,
                Ok(_) => {}
                Err(err) => break Some(err),
            }
        };

        self.teardown().await;
        match outcome {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Steps 6-11 of spec §4.7 for one claimed work item.
    async fn run_one_cycle(
        &mut self,
        item: WorkItem,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<CycleOutcome, EngineError> {
        let track = self
            .store
            .get_track(&item.track)?
            .unwrap_or_else(|| Track::new(&item.track, ""));

        self.merge_gate
            .ensure_branch(&item.branch, &item.base_branch)
            .await?;
        let worktree_path = self.config.workdir.join(self.engine.id.as_str());
        let wt = worktree::ensure(&self.config.repo, &worktree_path, &item.branch).await?;

        self.set_status(EngineStatus::Working).await?;
        let payload = self.build_context_payload(&item, &track).await?;

        let session = self.store.start_session(&self.engine.id, &item.id)?;
        let env = self.agent_env(&item.id);
        let mut spawned = supervisor::spawn(
            &wt.path,
            &self.config.agent_command,
            &self.config.agent_args,
            &env,
            &payload,
        )
        .await?;
        self.store.assign_session_pid(&session.id, spawned.pid)?;

        let mut detector = StallDetector::new(&self.config.stall);
        detector.start(Instant::now());
        detector.set_cycle(self.cycle_count);

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let outcome = loop {
            if let Some(reason) = detector.stalled() {
                let reason = reason.clone();
                spawned.signal(Signal::SIGTERM).ok();
                let _ = wait_with_grace(&mut spawned, self.config.shutdown_grace).await;
                break CycleOutcome::Stall(reason);
            }
            tokio::select! {
                biased;

                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        spawned.signal(Signal::SIGTERM).ok();
                        let _ = wait_with_grace(&mut spawned, self.config.shutdown_grace).await;
                        break CycleOutcome::Shutdown;
                    }
                }

                line = spawned.stdout.recv() => {
                    match line {
                        Some(line) => detector.on_stdout_line(&line, Instant::now()),
                        None => {}
                    }
                }

                line = spawned.stderr.recv() => {
                    let _ = line;
                }

                _ = ticker.tick() => {
                    detector.on_tick(Instant::now());
                    if let Some(signal) = self.poll_abort_for(&item.id)? {
                        spawned.signal(if signal { Signal::SIGKILL } else { Signal::SIGINT }).ok();
                        let _ = wait_with_grace(&mut spawned, self.config.shutdown_grace).await;
                        break CycleOutcome::Aborted { hard: signal };
                    }
                }

                result = spawned.done() => {
                    let code = result?;
                    break if code == 0 { CycleOutcome::Completed(code) } else { CycleOutcome::Clear(code) };
                }
            }
        };

        detector.stop();
        let exit_code = match &outcome {
            CycleOutcome::Completed(c) | CycleOutcome::Clear(c) => Some(*c),
            _ => None,
        };
        self.store.end_session(&session.id, exit_code)?;

        match &outcome {
            CycleOutcome::Completed(_) => self.on_completed(&item, &track, &wt.path).await?,
            CycleOutcome::Clear(_) => self.on_clear(&item)?,
            CycleOutcome::Stall(reason) => self.on_stall(&item, reason.clone())?,
            CycleOutcome::Aborted { hard } => self.on_abort(&item, *hard)?,
            CycleOutcome::Shutdown => {}
        }

        Ok(outcome)
    }

    /// Completed action (spec §4.7): hand off to the Merge Gate.
    ///
    /// Exit 0 is the subprocess's contract for having already called
    /// `railyard complete` itself (spec §6.2), which runs the Merge Gate
    /// directly against the store. The usual case here is just the
    /// bookkeeping that follows: the item is already `done`. A subprocess
    /// that exits 0 without having called `complete` breaks that contract;
    /// fall back to completing it here so the cycle still converges instead
    /// of leaving the item claimed with no progress note.
    async fn on_completed(
        &mut self,
        item: &WorkItem,
        track: &Track,
        worktree: &std::path::Path,
    ) -> Result<(), EngineError> {
        let reloaded = self.store.get(&item.id)?;
        if reloaded.status != WorkItemStatus::Done {
            let summary = format!("agent exited 0 without calling complete (cycle={})", self.cycle_count);
            self.merge_gate
                .complete(&item.id, &self.engine.id, &summary, track, worktree)
                .await?;
        }
        self.store.set_engine_current_car(&self.engine.id, None)?;
        self.current_car = None;
        self.set_status(EngineStatus::Idle).await?;
        self.cycle_count = 0;
        Ok(())
    }

    /// Clear action (spec §4.7): append a note, retain the claim, re-loop.
    fn on_clear(&mut self, item: &WorkItem) -> Result<(), EngineError> {
        self.store.add_progress_note(
            &item.id,
            self.engine.id.as_str(),
            self.cycle_count,
            &format!(
                "agent exited without completing, cycle={}",
                self.cycle_count
            ),
        )?;
        self.store.increment_cycle(&item.id)?;
        Ok(())
    }

    /// Stall action (spec §4.7): block the item and notify the supervisor.
    fn on_stall(&mut self, item: &WorkItem, reason: StallReason) -> Result<(), EngineError> {
        self.store.add_progress_note(
            &item.id,
            self.engine.id.as_str(),
            self.cycle_count,
            &format!("stalled: {reason}"),
        )?;
        self.store
            .release_work_item(&item.id, WorkItemStatus::Blocked)?;
        self.store.send_message(SendMessage {
            from_agent: self.engine.id.as_str().to_string(),
            to_agent: "supervisor".to_string(),
            subject: "stall".to_string(),
            body: reason.to_string(),
            priority: MessagePriority::Urgent,
            thread_id: None,
            car_id: Some(item.id.clone()),
        })?;
        self.store.set_engine_current_car(&self.engine.id, None)?;
        self.current_car = None;
        self.cycle_count = 0;
        Ok(())
    }

    /// Abort action (spec §4.7 step 3 / §4.9): release the item as `open`
    /// (soft) or `cancelled` (hard).
    fn on_abort(&mut self, item: &WorkItem, hard: bool) -> Result<(), EngineError> {
        let status = if hard {
            WorkItemStatus::Cancelled
        } else {
            WorkItemStatus::Open
        };
        self.store.release_work_item(&item.id, status)?;
        self.store.set_engine_current_car(&self.engine.id, None)?;
        self.current_car = None;
        self.cycle_count = 0;
        Ok(())
    }

    /// Step 3 of spec §4.7, run once per outer-loop iteration while idle
    /// (between cycles, not claiming anything). Pause/resume/abort messages
    /// not addressed to the engine's current work item are acknowledged and
    /// otherwise ignored, matching the "matching current_work_item" clause.
    ///
    /// Returns `false` if the loop should stop (reserved for a future
    /// supervisor-directed hard shutdown; always `true` today).
    fn process_inbox(&mut self) -> Result<bool, EngineError> {
        let inbox = self.store.inbox(self.engine.id.as_str())?;
        for msg in inbox {
            let Some(signal) = SupervisorSignal::parse(&msg.subject, &msg.body) else {
                continue;
            };
            match signal {
                SupervisorSignal::Pause => self.pause_flag = true,
                SupervisorSignal::Resume => self.pause_flag = false,
                SupervisorSignal::Abort { car_id, hard } => {
                    if self.current_car.as_ref() == Some(&car_id) {
                        self.on_abort(&self.fetch_item(&car_id)?, hard)?;
                    }
                }
            }
            self.acknowledge(&msg)?;
        }
        Ok(true)
    }

    /// 1 Hz poll for an abort addressed to `current`, run from inside the
    /// active-session select loop so scenario 6 ("while engine is working on
    /// A, send abort(A.id)") takes effect within one tick rather than
    /// waiting for the subprocess to exit on its own.
    fn poll_abort_for(&self, current: &WorkItemId) -> Result<Option<bool>, EngineError> {
        let inbox = self.store.inbox(self.engine.id.as_str())?;
        for msg in &inbox {
            if let Some(SupervisorSignal::Abort { car_id, hard }) =
                SupervisorSignal::parse(&msg.subject, &msg.body)
            {
                if &car_id == current {
                    self.acknowledge(msg)?;
                    return Ok(Some(hard));
                }
            }
        }
        Ok(None)
    }

    fn acknowledge(&self, msg: &Message) -> Result<(), EngineError> {
        if msg.is_broadcast() {
            self.store
                .acknowledge_broadcast(&msg.id, self.engine.id.as_str())?;
        } else {
            self.store.acknowledge(&msg.id)?;
        }
        Ok(())
    }

    fn fetch_item(&self, id: &WorkItemId) -> Result<WorkItem, EngineError> {
        Ok(self.store.get(id)?)
    }

    /// Step 6 of spec §4.7: work item fields + track conventions + recent
    /// progress notes + unacknowledged messages + recent git commits.
    async fn build_context_payload(
        &self,
        item: &WorkItem,
        track: &Track,
    ) -> Result<String, EngineError> {
        let progress = self.store.progress(&item.id)?;
        let messages = self.store.inbox(self.engine.id.as_str())?;
        let commits = recent_commits(&self.config.repo, &item.branch, 10).await;

        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", item.title));
        out.push_str(&format!("car: {}\ntrack: {}\ntype: {}\npriority: {}\n\n", item.id, item.track, item.item_type, item.priority));
        out.push_str("## Description\n\n");
        out.push_str(&item.description);
        out.push_str("\n\n## Acceptance Criteria\n\n");
        out.push_str(&item.acceptance_criteria);
        out.push_str("\n\n## Design Notes\n\n");
        out.push_str(&item.design_notes);
        out.push_str("\n\n## Track Conventions\n\n");
        for (k, v) in &track.conventions {
            out.push_str(&format!("- {k}: {v}\n"));
        }
        out.push_str("\n## Recent Progress\n\n");
        for note in progress.iter().rev().take(10).rev() {
            out.push_str(&format!("- [cycle {}] {}\n", note.cycle, note.note));
        }
        out.push_str("\n## Unacknowledged Messages\n\n");
        for msg in &messages {
            out.push_str(&format!("- from {}: {} — {}\n", msg.from_agent, msg.subject, msg.body));
        }
        out.push_str("\n## Recent Commits\n\n");
        for line in &commits {
            out.push_str(&format!("- {line}\n"));
        }
        Ok(out)
    }

    /// Subprocess input contract (spec §6.3): `config.agent_env` plus the
    /// well-known `RAILYARD_*` variables the agent needs to call `railyard
    /// complete`/`railyard progress` against this store without being
    /// handed extra command-line arguments.
    fn agent_env(&self, car_id: &WorkItemId) -> Vec<(String, String)> {
        let mut env = self.config.agent_env.clone();
        env.push((
            railyard_core::agent_env::STORE_DIR.to_string(),
            self.store.dir().display().to_string(),
        ));
        env.push((
            railyard_core::agent_env::OWNER.to_string(),
            self.store.owner().to_string(),
        ));
        env.push((
            railyard_core::agent_env::BRANCH_PREFIX.to_string(),
            self.store.branch_prefix().to_string(),
        ));
        env.push((
            railyard_core::agent_env::DEFAULT_BRANCH.to_string(),
            self.store.default_branch().to_string(),
        ));
        env.push((
            railyard_core::agent_env::ENGINE_ID.to_string(),
            self.engine.id.as_str().to_string(),
        ));
        env.push((railyard_core::agent_env::CAR_ID.to_string(), car_id.to_string()));
        env
    }

    /// Cancelled action (spec §4.7): deregister and release the worktree.
    async fn teardown(mut self) {
        if let Some(stop) = self.heartbeat_stop.take() {
            let _ = stop.send(true);
        }
        if let Some(handle) = self.heartbeat_handle.take() {
            let _ = handle.await;
        }
        if let Err(err) = self.store.deregister_engine(&self.engine.id) {
            warn!(engine = %self.engine.id, error = %err, "failed to deregister engine");
        }
        let worktree_path = self.config.workdir.join(self.engine.id.as_str());
        if let Err(err) = worktree::remove(&self.config.repo, &worktree_path).await {
            warn!(engine = %self.engine.id, error = %err, "failed to release worktree");
        }
        info!(engine = %self.engine.id, "engine loop stopped");
    }
}

/// Sleep for `duration`, returning early with `true` if `cancel` fires first.
async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        changed = cancel.changed() => changed.is_err() || *cancel.borrow(),
    }
}

/// Wait up to `grace` for the subprocess to exit after a signal, then
/// SIGKILL (spec §5: "waits up to `shutdown_grace` seconds, then kills; in
/// all cases it drains pipes before reporting done").
async fn wait_with_grace(
    spawned: &mut supervisor::Spawned,
    grace: Duration,
) -> Result<i32, EngineError> {
    match tokio::time::timeout(grace, spawned.done()).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            let _ = spawned.signal(Signal::SIGKILL);
            Ok(spawned.done().await?)
        }
    }
}

/// `git log --oneline -n <n> <branch>`, best-effort: an empty vec on any
/// failure (no commits yet, branch not pushed) rather than failing the
/// whole context payload build over it.
async fn recent_commits(repo: &std::path::Path, branch: &str, n: usize) -> Vec<String> {
    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["log", "--oneline", &format!("-n{n}")])
        .arg(branch)
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

/// Heartbeat task (spec §5: "one heartbeat task"). Emits a heartbeat every
/// [`HEARTBEAT_INTERVAL_MS`] and flips `failed` on the first store error,
/// which the main loop polls at the top of each iteration (step 2).
async fn run_heartbeat(
    store: Arc<Store>,
    engine_id: EngineId,
    status: Arc<AsyncMutex<EngineStatus>>,
    failed: Arc<AtomicBool>,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(HEARTBEAT_INTERVAL_MS as u64));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = *status.lock().await;
                if let Err(err) = store.heartbeat(&engine_id, current) {
                    warn!(engine = %engine_id, error = %err, "heartbeat failed");
                    failed.store(true, Ordering::SeqCst);
                    break;
                }
            }
            result = stop.changed() => {
                match result {
                    Ok(()) if *stop.borrow() => break,
                    Ok(()) => continue,
                    Err(_) => break,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_loop_tests.rs"]
mod tests;
