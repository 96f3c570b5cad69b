// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stall Detector (SPEC_FULL.md §4.6): watches one session's stdout stream
//! and classifies at most one [`StallReason`] before the Engine Loop stops
//! it.
//!
//! The detector is driven, not self-polling: the Engine Loop feeds it each
//! stdout line as it arrives over the Subprocess Supervisor's channel and
//! ticks it on a 1 Hz timer inside the same `tokio::select!` that watches
//! for session completion and cancellation (spec §4.7 step 10), so there is
//! one observation point rather than a second background task racing the
//! loop's own state.

use railyard_config::StallConfig;
use railyard_core::StallReason;
use std::time::{Duration, Instant};

/// Runtime state for one session's stall detection.
pub struct StallDetector {
    stdout_timeout: Duration,
    repeated_error_max: u32,
    max_clear_cycles: u32,
    last_stdout_at: Instant,
    last_error_line: Option<String>,
    repeated_error_count: u32,
    cycle_count: u32,
    emitted: Option<StallReason>,
}

impl StallDetector {
    pub fn new(config: &StallConfig) -> Self {
        Self {
            stdout_timeout: Duration::from_secs(config.stdout_timeout_sec),
            repeated_error_max: config.repeated_error_max,
            max_clear_cycles: config.max_clear_cycles,
            last_stdout_at: Instant::now(),
            last_error_line: None,
            repeated_error_count: 0,
            cycle_count: 0,
            emitted: None,
        }
    }

    /// Begin observing at `now`. Resets the silence clock so a detector
    /// reused across cycles doesn't inherit staleness from the previous one.
    pub fn start(&mut self, now: Instant) {
        self.last_stdout_at = now;
        self.last_error_line = None;
        self.repeated_error_count = 0;
        self.emitted = None;
    }

    /// Release resources. No-op beyond documenting the lifecycle symmetry
    /// with `start` (spec §4.6); the detector owns no handles of its own.
    pub fn stop(&mut self) {}

    /// Record a line observed on the session's stdout stream.
    pub fn on_stdout_line(&mut self, line: &str, now: Instant) {
        self.last_stdout_at = now;
        if self.emitted.is_some() {
            return;
        }
        if is_error_like(line) {
            if self.last_error_line.as_deref() == Some(line) {
                self.repeated_error_count += 1;
            } else {
                self.last_error_line = Some(line.to_string());
                self.repeated_error_count = 1;
            }
            if self.repeated_error_count >= self.repeated_error_max {
                self.emitted = Some(StallReason::RepeatedError {
                    detail: line.to_string(),
                });
            }
        } else {
            self.last_error_line = None;
            self.repeated_error_count = 0;
        }
    }

    /// Evaluate the silence rule against the current time. Called on the 1
    /// Hz timer tick from the Engine Loop's select.
    pub fn on_tick(&mut self, now: Instant) {
        if self.emitted.is_some() {
            return;
        }
        if now.duration_since(self.last_stdout_at) >= self.stdout_timeout {
            self.emitted = Some(StallReason::Silent {
                detail: self.stdout_timeout.as_secs().to_string(),
            });
        }
    }

    /// Engine Loop step 9: set the current clear-cycle count before each
    /// spawn. Reaching `max_clear_cycles` fires `cycle_exceeded` immediately
    /// rather than waiting for the next tick or line.
    pub fn set_cycle(&mut self, n: u32) {
        self.cycle_count = n;
        if self.emitted.is_none() && n >= self.max_clear_cycles {
            self.emitted = Some(StallReason::CycleExceeded);
        }
    }

    /// The stall reason, once and only once detected.
    pub fn stalled(&self) -> Option<&StallReason> {
        self.emitted.as_ref()
    }
}

/// A line is "error-like" (spec §4.6) if it mentions "error" case-insensitively
/// or carries a non-zero tool-exit marker such as `exit code 1` / `exit status: 2`.
fn is_error_like(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    if lower.contains("error") {
        return true;
    }
    for marker in ["exit code", "exit status"] {
        if let Some(rest) = lower.split(marker).nth(1) {
            let digits: String = rest
                .trim_start_matches([':', ' '])
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.parse::<u32>().map(|n| n != 0).unwrap_or(false) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "stall_tests.rs"]
mod tests;
