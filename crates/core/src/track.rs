// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Track: a named lane of work with a concurrent-engine budget.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named lane of work. Immutable after seeding — tracks come from
/// configuration, not from operator mutation at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub language: String,
    pub file_patterns: Vec<String>,
    /// Concurrent-engine cap for this track.
    pub engine_slots: u32,
    pub test_command: String,
    #[serde(default)]
    pub conventions: HashMap<String, String>,
}

impl Track {
    pub fn new(name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            file_patterns: Vec::new(),
            engine_slots: 1,
            test_command: "true".to_string(),
            conventions: HashMap::new(),
        }
    }
}

#[cfg(test)]
#[path = "track_tests.rs"]
mod tests;
