// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged error/outcome classification shared across crate boundaries.
//!
//! Every crate defines its own `thiserror`-derived error enum for the
//! mistakes specific to its layer (`StoreError`, `EngineError`, ...). Rather
//! than have the engine loop match on each concrete type, every such error
//! implements [`Classify`] to fold itself into one of the five kinds from
//! spec §7. Callers (CS, EL) match on [`ErrorKind`] only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five error kinds from §7, carried as a tagged outcome rather than a
/// distinguished exception hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No such row. Recoverable at the caller (CS sleeps and retries).
    NotFound,
    /// Optimistic or pessimistic lock rejected. Retried locally up to 3 times.
    Conflict,
    /// Store timeout or network blip. Retried with backoff.
    TransientIO,
    /// Malformed input (bad status transition, dependency cycle). Surfaced
    /// to the user, never retried.
    Invalid,
    /// Unrecoverable. Causes engine shutdown with a non-zero exit.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransientIO => "transient_io",
            ErrorKind::Invalid => "invalid",
            ErrorKind::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

impl ErrorKind {
    /// Whether the propagation policy (§7) retries an error of this kind
    /// without surfacing it to the operator.
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::NotFound | ErrorKind::Conflict | ErrorKind::TransientIO)
    }
}

/// Implemented by every crate-local error enum so the engine loop can react
/// to the error class without depending on the concrete type.
pub trait Classify {
    fn classify(&self) -> ErrorKind;
}

/// Outcome of one Engine Loop subprocess cycle (§4.7 step 10-11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    /// Subprocess exited 0.
    Completed,
    /// Subprocess exited non-zero without stalling.
    Clear,
    /// The stall detector classified the subprocess as non-productive.
    Stall(StallReason),
    /// A cancellation token fired before the subprocess produced an outcome.
    Cancelled,
}

/// Why the Stall Detector (§4.6) flagged the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StallReason {
    /// No stdout line observed for `detail` (human-readable duration).
    Silent { detail: String },
    /// `detail` is the offending line, repeated `repeated_error_max` times.
    RepeatedError { detail: String },
    /// `cycle_count` reached `max_clear_cycles` without a Completed outcome.
    CycleExceeded,
}

impl fmt::Display for StallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallReason::Silent { detail } => write!(f, "no output for {detail}"),
            StallReason::RepeatedError { detail } => write!(f, "repeated error: {detail}"),
            StallReason::CycleExceeded => write!(f, "clear-cycle limit exceeded"),
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
