// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess Supervisor (SPEC_FULL.md §4.5): spawns the agent subprocess,
//! feeds it the rendered context payload on stdin, and exposes its
//! stdout/stderr as ordered line streams plus a one-shot exit outcome.
//!
//! Built directly on [`tokio::process::Command`] with piped stdio and two
//! reader tasks forwarding lines over `tokio::sync::mpsc::UnboundedSender`,
//! and [`nix::sys::signal::kill`] for `signal()` — the direct-subprocess
//! analogue of the tmux-pane [`railyard_adapters::SessionAdapter`] pattern:
//! same spawn/kill/is_alive shape, different transport (spec §4.5).

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn agent subprocess: {0}")]
    Spawn(std::io::Error),
    #[error("failed to write context payload to agent stdin: {0}")]
    WriteStdin(std::io::Error),
    #[error("failed to wait for agent subprocess: {0}")]
    Wait(std::io::Error),
    #[error("failed to signal agent subprocess: {0}")]
    Signal(#[from] nix::Error),
    #[error("agent subprocess exited without a platform exit code (likely killed by a signal)")]
    NoExitCode,
}

/// One live subprocess invocation, the runtime counterpart of
/// [`railyard_core::Session`] (whose id/timestamps the Engine Loop persists
/// via `Store::start_session`/`end_session`).
pub struct Spawned {
    pub pid: u32,
    pub stdout: mpsc::UnboundedReceiver<String>,
    pub stderr: mpsc::UnboundedReceiver<String>,
    done: oneshot::Receiver<Result<std::process::ExitStatus, std::io::Error>>,
}

impl Spawned {
    /// Deliver a signal to the subprocess. Deliverable at any point between
    /// spawn and `done()` resolving (spec §4.5 contract).
    pub fn signal(&self, sig: Signal) -> Result<(), SupervisorError> {
        kill(Pid::from_raw(self.pid as i32), sig)?;
        Ok(())
    }

    /// Wait for the subprocess to exit. Takes `&mut self` rather than
    /// `self` so the Engine Loop can still read `stdout`/`stderr` and call
    /// `signal` while this future is pending in a `select!`; a second call
    /// after the first resolves finds the oneshot channel already drained
    /// and returns `NoExitCode`, which is what "`done()` yields at most
    /// once" (spec §4.5) means in practice.
    pub async fn done(&mut self) -> Result<i32, SupervisorError> {
        let status = (&mut self.done)
            .await
            .map_err(|_| SupervisorError::NoExitCode)?
            .map_err(SupervisorError::Wait)?;
        status.code().ok_or(SupervisorError::NoExitCode)
    }
}

/// Spawn the agent subprocess in `work_dir`, writing `context_payload` to its
/// stdin and closing it so the agent sees EOF on its primary input (spec
/// §6 "Subprocess input contract").
pub async fn spawn(
    work_dir: &Path,
    command: &str,
    args: &[String],
    env: &[(String, String)],
    context_payload: &str,
) -> Result<Spawned, SupervisorError> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .current_dir(work_dir)
        .envs(env.iter().map(|(k, v)| (k.clone(), v.clone())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(SupervisorError::Spawn)?;
    let pid = child.id().ok_or(SupervisorError::NoExitCode)?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(context_payload.as_bytes())
            .await
            .map_err(SupervisorError::WriteStdin)?;
        // Dropping stdin closes the pipe so the agent observes EOF.
    }

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    tokio::spawn(pump_lines(stdout, stdout_tx));
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
    tokio::spawn(pump_lines(stderr, stderr_tx));

    let (done_tx, done_rx) = oneshot::channel();
    tokio::spawn(async move {
        let status = child.wait().await;
        let _ = done_tx.send(status);
    });

    Ok(Spawned {
        pid,
        stdout: stdout_rx,
        stderr: stderr_rx,
        done: done_rx,
    })
}

/// Forward a piped stream's lines into `tx`, in order, until the pipe
/// closes. Guarantees ordered-per-stream delivery (spec §4.5); interleaving
/// across stdout/stderr is unspecified, matching the spec's contract.
async fn pump_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
