// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! YAML configuration loading for the Railyard engine daemon (spec §6.1).
//!
//! `Config::load` reads the declarative config file and validates the
//! required top-level fields (`owner`, `repo`, `branch_prefix`,
//! `default_branch`, `store`, `tracks`, `stall`). A missing required field is
//! a [`ConfigError`] that [`Classify`]es as [`ErrorKind::Fatal`] (§7): the
//! caller reports it to stderr and exits non-zero before any engine starts.

use railyard_core::{Classify, ErrorKind, Track};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Default poll interval (seconds) between Engine Loop iterations when idle.
pub const DEFAULT_POLL_INTERVAL_SEC: u64 = 5;
/// Default grace period (seconds) the Subprocess Supervisor waits between a
/// polite signal and SIGKILL on cancellation.
pub const DEFAULT_SHUTDOWN_GRACE_SEC: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("missing required config field: {0}")]
    MissingField(&'static str),
    #[error("track {0:?} has no name")]
    TrackMissingName(usize),
    #[error("track {name:?}: {reason}")]
    InvalidTrack { name: String, reason: String },
}

impl Classify for ConfigError {
    fn classify(&self) -> ErrorKind {
        // Every config error is Fatal (§7): malformed or absent configuration
        // always terminates before any engine starts.
        ErrorKind::Fatal
    }
}

/// Store connection settings (spec §6.1). `host`/`port` are carried for
/// forward compatibility with a networked store but are not consulted by the
/// bundled file-backed store, which treats `database` as a directory path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    pub database: String,
}

/// Stall Detector thresholds (spec §4.6 / §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallConfig {
    pub stdout_timeout_sec: u64,
    pub repeated_error_max: u32,
    pub max_clear_cycles: u32,
}

/// How to spawn the agent subprocess (spec §6.3 "Subprocess input
/// contract"). Not named explicitly among spec §6.1's required fields
/// (the distillation assumes an agent binary is just known); carried here
/// since `engine start` has nothing else to spawn.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    owner: Option<String>,
    repo: Option<String>,
    branch_prefix: Option<String>,
    default_branch: Option<String>,
    store: Option<StoreConfig>,
    tracks: Option<Vec<Track>>,
    stall: Option<StallConfig>,
    agent: Option<AgentConfig>,
    poll_interval_sec: Option<u64>,
    shutdown_grace_sec: Option<u64>,
}

/// The fully validated, loaded configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub owner: String,
    pub repo: String,
    pub branch_prefix: String,
    pub default_branch: String,
    pub store: StoreConfig,
    pub tracks: Vec<Track>,
    pub stall: StallConfig,
    pub agent: AgentConfig,
    pub poll_interval_sec: u64,
    pub shutdown_grace_sec: u64,
}

impl Config {
    /// Load and validate a config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse and validate config text directly (used by tests and by
    /// `load`, which adds file-read context to the error).
    pub fn parse(text: &str, path: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let owner = raw.owner.ok_or(ConfigError::MissingField("owner"))?;
        let repo = raw.repo.ok_or(ConfigError::MissingField("repo"))?;
        let branch_prefix = raw
            .branch_prefix
            .ok_or(ConfigError::MissingField("branch_prefix"))?;
        let default_branch = raw
            .default_branch
            .ok_or(ConfigError::MissingField("default_branch"))?;
        let store = raw.store.ok_or(ConfigError::MissingField("store"))?;
        let tracks = raw.tracks.ok_or(ConfigError::MissingField("tracks"))?;
        let stall = raw.stall.ok_or(ConfigError::MissingField("stall"))?;
        let agent = raw.agent.ok_or(ConfigError::MissingField("agent"))?;
        if agent.command.is_empty() {
            return Err(ConfigError::MissingField("agent.command"));
        }

        if tracks.is_empty() {
            return Err(ConfigError::InvalidTrack {
                name: String::new(),
                reason: "tracks must name at least one track".to_string(),
            });
        }
        for (i, track) in tracks.iter().enumerate() {
            if track.name.is_empty() {
                return Err(ConfigError::TrackMissingName(i));
            }
            if track.engine_slots == 0 {
                return Err(ConfigError::InvalidTrack {
                    name: track.name.clone(),
                    reason: "engine_slots must be at least 1".to_string(),
                });
            }
        }

        Ok(Config {
            owner,
            repo,
            branch_prefix,
            default_branch,
            store,
            tracks,
            stall,
            agent,
            poll_interval_sec: raw.poll_interval_sec.unwrap_or(DEFAULT_POLL_INTERVAL_SEC),
            shutdown_grace_sec: raw
                .shutdown_grace_sec
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SEC),
        })
    }

    /// Look up a track by name.
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Directory holding the WAL and snapshot (`store.database`).
    pub fn store_dir(&self) -> &Path {
        Path::new(&self.store.database)
    }

    /// Build the branch name for a work item: `<branch_prefix>/<owner>/<track>/<car-id>`.
    pub fn branch_name(&self, track: &str, car_id: &str) -> String {
        format!("{}/{}/{}/{}", self.branch_prefix, self.owner, track, car_id)
    }

    pub fn agent_command(&self) -> &str {
        &self.agent.command
    }

    pub fn agent_args(&self) -> &[String] {
        &self.agent.args
    }

    /// `agent.env` as the `(name, value)` pairs the Subprocess Supervisor
    /// expects, in an unspecified but stable-within-a-process order.
    pub fn agent_env(&self) -> Vec<(String, String)> {
        self.agent
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Convenience alias used by callers that only care about a track's
/// `conventions` map shape (kept distinct from `railyard_core::Track`'s
/// field so config parsing errors name it explicitly).
pub type Conventions = HashMap<String, String>;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
