// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Store`: the file-backed Persistent Store facade (§2 PS, §4.1-§4.9).
//!
//! Every mutating method acquires a whole-store advisory lock (`fs2` flock
//! on a `.lock` file beside the WAL), reloads `MaterializedState` from the
//! latest snapshot plus WAL suffix, applies one or more [`Event`]s, flushes
//! the WAL, and releases the lock. There is no long-lived in-memory state:
//! each call sees every other process's writes that landed before it
//! acquired the lock, which is what "row-level locking" becomes when there
//! are no rows, only a WAL (see SPEC_FULL.md §4.4).

use crate::event::Event;
use crate::migration::MigrationRegistry;
use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::MaterializedState;
use crate::wal::{Wal, WalError};
use fs2::FileExt;
use railyard_core::{
    Clock, Dependency, DependencyType, Engine, EngineId, EngineStatus, IdGen, Message,
    MessageId, MessagePriority, ProgressNote, Session, SessionId, ShortTokenIdGen, SystemClock,
    ThreadId, Track, WorkItem, WorkItemId, WorkItemStatus, WorkItemType, MAX_PRIORITY,
};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of WAL entries between snapshots. Chosen to bound replay cost on
/// recovery without snapshotting so often that save latency dominates.
const SNAPSHOT_INTERVAL: u64 = 200;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("work item not found: {0}")]
    WorkItemNotFound(WorkItemId),
    #[error("engine not found: {0}")]
    EngineNotFound(EngineId),
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("invalid priority {0}, must be 0-{max}", max = MAX_PRIORITY)]
    InvalidPriority(u8),
    #[error("cannot transition {from} -> {to}")]
    InvalidTransition {
        from: WorkItemStatus,
        to: WorkItemStatus,
    },
    #[error("adding blocked_by {blocked_by} to {work_item_id} would introduce a cycle")]
    DependencyCycle {
        work_item_id: WorkItemId,
        blocked_by: WorkItemId,
    },
    #[error("base branch {0} is already locked by {1}")]
    BaseBranchLocked(String, String),
    #[error("track {track} has no free engine slots ({slots} in use)")]
    TrackFull { track: String, slots: u32 },
}

impl railyard_core::Classify for StoreError {
    fn classify(&self) -> railyard_core::ErrorKind {
        use railyard_core::ErrorKind;
        match self {
            StoreError::Io(_) | StoreError::Wal(_) | StoreError::Snapshot(_) => {
                ErrorKind::TransientIO
            }
            StoreError::NotFound(_)
            | StoreError::WorkItemNotFound(_)
            | StoreError::EngineNotFound(_)
            | StoreError::MessageNotFound(_)
            | StoreError::SessionNotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidPriority(_)
            | StoreError::InvalidTransition { .. }
            | StoreError::DependencyCycle { .. } => ErrorKind::Invalid,
            StoreError::BaseBranchLocked(..) => ErrorKind::Conflict,
            StoreError::TrackFull { .. } => ErrorKind::Conflict,
        }
    }
}

/// Object-safe facade over [`railyard_core::IdGen`] so `Store` can hold a
/// `Box<dyn IdSource>` (`IdGen` itself requires `Clone`, which isn't object
/// safe).
pub trait IdSource: Send + Sync {
    fn next(&self) -> String;
}

impl<T: IdGen> IdSource for T {
    fn next(&self) -> String {
        IdGen::next(self)
    }
}

/// Fields accepted by [`Store::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateWorkItem {
    pub title: String,
    pub item_type: WorkItemType,
    pub priority: Option<u8>,
    pub track: String,
    pub base_branch: Option<String>,
    pub parent_id: Option<WorkItemId>,
    pub description: String,
    pub acceptance_criteria: String,
    pub design_notes: String,
    pub skip_tests: bool,
    /// Request `draft` status directly rather than inheriting it. An epic
    /// is usually seeded this way so its children can be authored before
    /// the whole tree is published (§4.1 `publish`); a child still inherits
    /// `draft` from a draft parent regardless of this flag.
    pub draft: bool,
}

/// Field-level patch applied by [`Store::update`]. `None` leaves a field
/// untouched; `status` is validated against
/// [`WorkItemStatus::can_transition_to`] before being applied.
#[derive(Debug, Clone, Default)]
pub struct WorkItemPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub acceptance_criteria: Option<String>,
    pub design_notes: Option<String>,
    pub priority: Option<u8>,
    pub skip_tests: Option<bool>,
    pub status: Option<WorkItemStatus>,
}

/// Filters accepted by [`Store::list`].
#[derive(Debug, Clone, Default)]
pub struct WorkItemFilter {
    pub track: Option<String>,
    pub status: Option<WorkItemStatus>,
    pub parent_id: Option<WorkItemId>,
}

/// Fields accepted by [`Store::send_message`].
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub from_agent: String,
    pub to_agent: String,
    pub subject: String,
    pub body: String,
    pub priority: MessagePriority,
    pub thread_id: Option<ThreadId>,
    pub car_id: Option<WorkItemId>,
}

/// File-backed implementation of the Persistent Store.
pub struct Store {
    dir: PathBuf,
    owner: String,
    branch_prefix: String,
    default_branch: String,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdSource>,
}

impl Store {
    /// Open (creating if absent) a store directory using real time and
    /// short-token ids.
    pub fn open(
        dir: impl Into<PathBuf>,
        owner: impl Into<String>,
        branch_prefix: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Self::with_clock_and_ids(
            dir,
            owner,
            branch_prefix,
            default_branch,
            Box::new(SystemClock),
            Box::new(ShortTokenIdGen),
        )
    }

    /// Open with an injected clock/id generator, for deterministic tests.
    pub fn with_clock_and_ids(
        dir: impl Into<PathBuf>,
        owner: impl Into<String>,
        branch_prefix: impl Into<String>,
        default_branch: impl Into<String>,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdSource>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            owner: owner.into(),
            branch_prefix: branch_prefix.into(),
            default_branch: default_branch.into(),
            clock,
            ids,
        })
    }

    /// Directory holding the WAL and snapshot, for exporting to agent
    /// subprocesses via [`railyard_core::agent_env::STORE_DIR`].
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn branch_prefix(&self) -> &str {
        &self.branch_prefix
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(".lock")
    }

    fn wal_path(&self) -> PathBuf {
        self.dir.join("wal.jsonl")
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.bin")
    }

    fn load(&self) -> Result<(MaterializedState, Wal), StoreError> {
        let snapshot = Snapshot::load_with_migrations(&self.snapshot_path(), &MigrationRegistry::new())?;
        let (mut state, seq) = match snapshot {
            Some(s) => (s.state, s.seq),
            None => (MaterializedState::default(), 0),
        };
        let mut wal = Wal::open(&self.wal_path(), seq)?;
        for entry in wal.entries_after(seq)? {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
        }
        Ok((state, wal))
    }

    fn maybe_snapshot(&self, state: &MaterializedState, seq: u64) -> Result<(), StoreError> {
        let existing_seq = Snapshot::load(&self.snapshot_path())?
            .map(|s| s.seq)
            .unwrap_or(0);
        if seq.saturating_sub(existing_seq) >= SNAPSHOT_INTERVAL {
            Snapshot::new(seq, state.clone()).save(&self.snapshot_path())?;
        }
        Ok(())
    }

    /// Run `f` under the whole-store advisory lock, against freshly-loaded
    /// state, flushing the WAL (and snapshotting opportunistically) before
    /// releasing the lock.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut MaterializedState, &mut Wal, i64, &dyn IdSource) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let outcome = (|| {
            let (mut state, mut wal) = self.load()?;
            let now = self.clock.epoch_ms() as i64;
            let result = f(&mut state, &mut wal, now, self.ids.as_ref())?;
            wal.flush()?;
            self.maybe_snapshot(&state, wal.write_seq())?;
            Ok(result)
        })();

        let _ = FileExt::unlock(&lock_file);
        outcome
    }

    fn now_ms(&self) -> i64 {
        self.clock.epoch_ms() as i64
    }

    // ---- Work-Item Model (§4.1) ----------------------------------------

    pub fn create(&self, opts: CreateWorkItem) -> Result<WorkItem, StoreError> {
        let priority = opts.priority.unwrap_or(railyard_core::DEFAULT_PRIORITY);
        if priority > MAX_PRIORITY {
            return Err(StoreError::InvalidPriority(priority));
        }

        self.transact(|state, wal, now, ids| {
            let parent = opts
                .parent_id
                .as_ref()
                .and_then(|p| state.get_work_item(p));
            let track = if opts.track.is_empty() {
                parent.map(|p| p.track.clone()).unwrap_or_default()
            } else {
                opts.track.clone()
            };
            let status = if opts.draft
                || parent.map(|p| p.status == WorkItemStatus::Draft) == Some(true)
            {
                WorkItemStatus::Draft
            } else {
                WorkItemStatus::Open
            };
            let id = WorkItemId::new(ids.next());
            let branch = format!("{}/{}/{}/{}", self.branch_prefix, self.owner, track, id);
            let base_branch = opts
                .base_branch
                .clone()
                .unwrap_or_else(|| self.default_branch.clone());

            emit(
                state,
                wal,
                Event::WorkItemCreated {
                    id: id.clone(),
                    title: opts.title.clone(),
                    item_type: opts.item_type,
                    priority,
                    track,
                    branch,
                    base_branch,
                    parent_id: opts.parent_id.clone(),
                    description: opts.description.clone(),
                    acceptance_criteria: opts.acceptance_criteria.clone(),
                    design_notes: opts.design_notes.clone(),
                    skip_tests: opts.skip_tests,
                    status,
                    created_at: now,
                },
            )?;
            state
                .get_work_item(&id)
                .cloned()
                .ok_or(StoreError::WorkItemNotFound(id))
        })
    }

    pub fn get(&self, id: &WorkItemId) -> Result<WorkItem, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))
        })
    }

    pub fn list(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItem>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            let mut items: Vec<WorkItem> = state
                .work_items
                .values()
                .filter(|w| {
                    filter
                        .track
                        .as_deref()
                        .map(|t| w.track == t)
                        .unwrap_or(true)
                })
                .filter(|w| filter.status.map(|s| w.status == s).unwrap_or(true))
                .filter(|w| {
                    filter
                        .parent_id
                        .as_ref()
                        .map(|p| w.parent_id.as_ref() == Some(p))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(items)
        })
    }

    pub fn update(&self, id: &WorkItemId, patch: WorkItemPatch) -> Result<WorkItem, StoreError> {
        if let Some(p) = patch.priority {
            if p > MAX_PRIORITY {
                return Err(StoreError::InvalidPriority(p));
            }
        }

        self.transact(|state, wal, now, _ids| {
            let current = state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))?;

            if let Some(status) = patch.status {
                if status != current.status {
                    if !current.status.can_transition_to(status) {
                        return Err(StoreError::InvalidTransition {
                            from: current.status,
                            to: status,
                        });
                    }
                    emit(
                        state,
                        wal,
                        Event::WorkItemStatusChanged {
                            id: id.clone(),
                            status,
                            at: now,
                        },
                    )?;
                }
            }

            let touches_fields = patch.title.is_some()
                || patch.description.is_some()
                || patch.acceptance_criteria.is_some()
                || patch.design_notes.is_some()
                || patch.priority.is_some()
                || patch.skip_tests.is_some();
            if touches_fields {
                emit(
                    state,
                    wal,
                    Event::WorkItemFieldsUpdated {
                        id: id.clone(),
                        title: patch.title.clone(),
                        description: patch.description.clone(),
                        acceptance_criteria: patch.acceptance_criteria.clone(),
                        design_notes: patch.design_notes.clone(),
                        priority: patch.priority,
                        skip_tests: patch.skip_tests,
                    },
                )?;
            }

            state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))
        })
    }

    pub fn add_dep(
        &self,
        work_item_id: &WorkItemId,
        blocked_by: &WorkItemId,
        dep_type: DependencyType,
    ) -> Result<Dependency, StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if state.get_work_item(work_item_id).is_none() {
                return Err(StoreError::WorkItemNotFound(work_item_id.clone()));
            }
            if state.get_work_item(blocked_by).is_none() {
                return Err(StoreError::WorkItemNotFound(blocked_by.clone()));
            }
            if dep_type == DependencyType::Blocks
                && state.would_introduce_cycle(work_item_id, blocked_by)
            {
                return Err(StoreError::DependencyCycle {
                    work_item_id: work_item_id.clone(),
                    blocked_by: blocked_by.clone(),
                });
            }
            emit(
                state,
                wal,
                Event::DependencyAdded {
                    work_item_id: work_item_id.clone(),
                    blocked_by: blocked_by.clone(),
                    dep_type,
                },
            )?;
            Ok(Dependency {
                work_item_id: work_item_id.clone(),
                blocked_by: blocked_by.clone(),
                dep_type,
            })
        })
    }

    pub fn remove_dep(
        &self,
        work_item_id: &WorkItemId,
        blocked_by: &WorkItemId,
    ) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(
                state,
                wal,
                Event::DependencyRemoved {
                    work_item_id: work_item_id.clone(),
                    blocked_by: blocked_by.clone(),
                },
            )
        })
    }

    /// All dependency edges naming `work_item_id`, either as the dependent or
    /// as a blocker, for `car dep list` (spec §6.2).
    pub fn deps(&self, work_item_id: &WorkItemId) -> Result<Vec<Dependency>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state
                .dependencies
                .iter()
                .filter(|d| &d.work_item_id == work_item_id || &d.blocked_by == work_item_id)
                .cloned()
                .collect())
        })
    }

    pub fn ready(&self, track: Option<&str>) -> Result<Vec<WorkItem>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state.ready(track).into_iter().cloned().collect())
        })
    }

    pub fn children(&self, id: &WorkItemId) -> Result<Vec<WorkItem>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state.children_of(id).into_iter().cloned().collect())
        })
    }

    pub fn publish(&self, id: &WorkItemId, recursive: bool) -> Result<(), StoreError> {
        self.transact(|state, wal, now, _ids| {
            let item = state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))?;
            if item.status == WorkItemStatus::Draft {
                emit(
                    state,
                    wal,
                    Event::WorkItemStatusChanged {
                        id: id.clone(),
                        status: WorkItemStatus::Open,
                        at: now,
                    },
                )?;
            }
            if recursive {
                let mut stack: Vec<WorkItemId> =
                    state.children_of(id).into_iter().map(|w| w.id.clone()).collect();
                while let Some(child_id) = stack.pop() {
                    let Some(child) = state.get_work_item(&child_id).cloned() else {
                        continue;
                    };
                    if child.status == WorkItemStatus::Draft {
                        emit(
                            state,
                            wal,
                            Event::WorkItemStatusChanged {
                                id: child_id.clone(),
                                status: WorkItemStatus::Open,
                                at: now,
                            },
                        )?;
                    }
                    stack.extend(
                        state
                            .children_of(&child_id)
                            .into_iter()
                            .map(|w| w.id.clone()),
                    );
                }
            }
            Ok(())
        })
    }

    pub fn add_progress_note(
        &self,
        id: &WorkItemId,
        engine_id: &str,
        cycle: u32,
        note: &str,
    ) -> Result<ProgressNote, StoreError> {
        self.transact(|state, wal, now, _ids| {
            if state.get_work_item(id).is_none() {
                return Err(StoreError::WorkItemNotFound(id.clone()));
            }
            emit(
                state,
                wal,
                Event::ProgressNoteAdded {
                    work_item_id: id.clone(),
                    cycle,
                    engine_id: engine_id.to_string(),
                    note: note.to_string(),
                    created_at: now,
                },
            )?;
            Ok(ProgressNote {
                work_item_id: id.clone(),
                cycle,
                engine_id: EngineId::new(engine_id),
                note: note.to_string(),
                created_at: now,
            })
        })
    }

    /// A work item's append-only progress log, oldest first.
    pub fn progress(&self, id: &WorkItemId) -> Result<Vec<ProgressNote>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state
                .progress_notes
                .get(id)
                .cloned()
                .unwrap_or_default())
        })
    }

    pub fn increment_cycle(&self, id: &WorkItemId) -> Result<u32, StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if state.get_work_item(id).is_none() {
                return Err(StoreError::WorkItemNotFound(id.clone()));
            }
            emit(state, wal, Event::WorkItemCycleIncremented { id: id.clone() })?;
            Ok(state.get_work_item(id).map(|w| w.cycle_count).unwrap_or(0))
        })
    }

    pub fn reset_cycle(&self, id: &WorkItemId) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(state, wal, Event::WorkItemCycleReset { id: id.clone() })
        })
    }

    /// Release a work item's claim (abort / clear-to-blocked / stall), and
    /// reset its clear-cycle counter. Used by the Engine Loop's abort and
    /// stall handling (spec §4.7 step 3 and the Stall action).
    pub fn release_work_item(
        &self,
        id: &WorkItemId,
        status: WorkItemStatus,
    ) -> Result<(), StoreError> {
        self.transact(|state, wal, now, _ids| {
            emit(state, wal, Event::WorkItemReleased { id: id.clone(), at: now })?;
            let current = state.get_work_item(id).map(|w| w.status);
            if current != Some(status) {
                emit(
                    state,
                    wal,
                    Event::WorkItemStatusChanged {
                        id: id.clone(),
                        status,
                        at: now,
                    },
                )?;
            }
            emit(state, wal, Event::WorkItemCycleReset { id: id.clone() })
        })
    }

    // ---- Engine Registry (§4.2) -----------------------------------------

    /// Register a new engine on `track`, enforcing the track's
    /// concurrent-engine cap (spec §3 Track "slots") when the track has been
    /// seeded via [`Store::seed_track`]. A track that was never seeded (no
    /// config loaded it yet) has no enforced cap, matching the unseeded
    /// fallback `Track::new` used elsewhere in this module.
    pub fn register_engine(&self, track: &str) -> Result<Engine, StoreError> {
        self.transact(|state, wal, now, ids| {
            if let Some(t) = state.tracks.get(track) {
                let active = state
                    .engines
                    .values()
                    .filter(|e| e.track == track && e.status != EngineStatus::Dead)
                    .count() as u32;
                if active >= t.engine_slots {
                    return Err(StoreError::TrackFull {
                        track: track.to_string(),
                        slots: t.engine_slots,
                    });
                }
            }

            let id = EngineId::new(ids.next());
            emit(
                state,
                wal,
                Event::EngineRegistered {
                    id: id.clone(),
                    track: track.to_string(),
                    at: now,
                },
            )?;
            state
                .engines
                .get(&id)
                .cloned()
                .ok_or(StoreError::EngineNotFound(id))
        })
    }

    pub fn heartbeat(&self, id: &EngineId, status: EngineStatus) -> Result<(), StoreError> {
        self.transact(|state, wal, now, _ids| {
            if state.engines.get(id).is_none() {
                return Err(StoreError::EngineNotFound(id.clone()));
            }
            emit(
                state,
                wal,
                Event::EngineHeartbeat {
                    id: id.clone(),
                    at: now,
                    status,
                },
            )
        })
    }

    pub fn set_engine_current_car(
        &self,
        id: &EngineId,
        current_car: Option<WorkItemId>,
    ) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(
                state,
                wal,
                Event::EngineCurrentCarChanged {
                    id: id.clone(),
                    current_car,
                },
            )
        })
    }

    pub fn set_engine_status(&self, id: &EngineId, status: EngineStatus) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(
                state,
                wal,
                Event::EngineStatusChanged {
                    id: id.clone(),
                    status,
                },
            )
        })
    }

    pub fn deregister_engine(&self, id: &EngineId) -> Result<(), StoreError> {
        self.transact(|state, wal, now, _ids| {
            release_orphan_claim(state, wal, id, now)?;
            emit(state, wal, Event::EngineDeregistered { id: id.clone() })
        })
    }

    pub fn get_engine(&self, id: &EngineId) -> Result<Engine, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            state
                .engines
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::EngineNotFound(id.clone()))
        })
    }

    pub fn list_engines(&self) -> Result<Vec<Engine>, StoreError> {
        self.transact(|state, _wal, _now, _ids| Ok(state.engines.values().cloned().collect()))
    }

    /// Sweep for engines whose last heartbeat exceeds
    /// [`railyard_core::DEAD_ENGINE_THRESHOLD_MS`], releasing their claims and
    /// marking them `dead`. `claim` already does this opportunistically; a
    /// multi-engine deployment additionally drives this from a timer (see
    /// `railyard-engine::reaper`) so a track with every engine stuck mid-cycle
    /// still gets its work items back on the ready queue.
    pub fn reap_dead_engines(&self) -> Result<Vec<EngineId>, StoreError> {
        self.transact(|state, wal, now, _ids| {
            let dead = state.dead_engines(now);
            reap_dead_engines(state, wal, now)?;
            Ok(dead)
        })
    }

    // ---- Messaging Bus (§4.3) -------------------------------------------

    pub fn send_message(&self, opts: SendMessage) -> Result<Message, StoreError> {
        self.transact(|state, wal, now, ids| {
            let id = MessageId::new(ids.next());
            emit(
                state,
                wal,
                Event::MessageSent {
                    id: id.clone(),
                    from_agent: opts.from_agent.clone(),
                    to_agent: opts.to_agent.clone(),
                    subject: opts.subject.clone(),
                    body: opts.body.clone(),
                    priority: opts.priority,
                    thread_id: opts.thread_id.clone(),
                    car_id: opts.car_id.clone(),
                    created_at: now,
                },
            )?;
            state
                .messages
                .get(&id)
                .cloned()
                .ok_or(StoreError::MessageNotFound(id))
        })
    }

    pub fn inbox(&self, agent: &str) -> Result<Vec<Message>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state.inbox(agent).into_iter().cloned().collect())
        })
    }

    pub fn acknowledge(&self, id: &MessageId) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if state.messages.get(id).is_none() {
                return Err(StoreError::MessageNotFound(id.clone()));
            }
            emit(state, wal, Event::MessageAcknowledged { id: id.clone() })
        })
    }

    pub fn acknowledge_broadcast(&self, id: &MessageId, recipient: &str) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if state.messages.get(id).is_none() {
                return Err(StoreError::MessageNotFound(id.clone()));
            }
            emit(
                state,
                wal,
                Event::BroadcastAcknowledged {
                    id: id.clone(),
                    recipient: recipient.to_string(),
                },
            )
        })
    }

    pub fn thread(&self, thread_id: &ThreadId) -> Result<Vec<Message>, StoreError> {
        self.transact(|state, _wal, _now, _ids| {
            Ok(state.thread(thread_id).into_iter().cloned().collect())
        })
    }

    // ---- Claim Scheduler (§4.4) ------------------------------------------

    pub fn claim(&self, engine_id: &EngineId, track: &str) -> Result<WorkItem, StoreError> {
        self.transact(|state, wal, now, _ids| {
            if state.engines.get(engine_id).is_none() {
                return Err(StoreError::EngineNotFound(engine_id.clone()));
            }
            reap_dead_engines(state, wal, now)?;

            let head = state.ready(Some(track)).first().map(|w| w.id.clone());
            let Some(work_item_id) = head else {
                return Err(StoreError::NotFound(format!(
                    "no ready work item on track {track}"
                )));
            };

            emit(
                state,
                wal,
                Event::WorkItemAssigned {
                    id: work_item_id.clone(),
                    engine_id: engine_id.clone(),
                    at: now,
                },
            )?;
            emit(
                state,
                wal,
                Event::WorkItemStatusChanged {
                    id: work_item_id.clone(),
                    status: WorkItemStatus::Claimed,
                    at: now,
                },
            )?;
            emit(
                state,
                wal,
                Event::EngineCurrentCarChanged {
                    id: engine_id.clone(),
                    current_car: Some(work_item_id.clone()),
                },
            )?;
            emit(
                state,
                wal,
                Event::EngineStatusChanged {
                    id: engine_id.clone(),
                    status: EngineStatus::Working,
                },
            )?;

            state
                .get_work_item(&work_item_id)
                .cloned()
                .ok_or(StoreError::WorkItemNotFound(work_item_id))
        })
    }

    pub fn claim_or_reclaim(&self, engine_id: &EngineId, track: &str) -> Result<WorkItem, StoreError> {
        let current = self.transact(|state, _wal, _now, _ids| {
            let engine = state
                .engines
                .get(engine_id)
                .cloned()
                .ok_or_else(|| StoreError::EngineNotFound(engine_id.clone()))?;
            Ok(engine
                .current_car
                .and_then(|id| state.get_work_item(&id).cloned()))
        })?;

        if let Some(item) = current {
            if matches!(item.status, WorkItemStatus::Claimed | WorkItemStatus::InProgress) {
                return Ok(item);
            }
            self.set_engine_current_car(engine_id, None)?;
        }

        self.claim(engine_id, track)
    }

    // ---- Subprocess Supervisor session bookkeeping (§4.5) ----------------

    pub fn start_session(
        &self,
        engine_id: &EngineId,
        car_id: &WorkItemId,
    ) -> Result<Session, StoreError> {
        self.transact(|state, wal, now, ids| {
            let id = SessionId::new(ids.next());
            emit(
                state,
                wal,
                Event::SessionStarted {
                    id: id.clone(),
                    engine_id: engine_id.clone(),
                    car_id: car_id.clone(),
                    started_at: now,
                },
            )?;
            state
                .sessions
                .get(&id)
                .cloned()
                .ok_or(StoreError::SessionNotFound(id))
        })
    }

    pub fn assign_session_pid(&self, id: &SessionId, pid: u32) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(state, wal, Event::SessionPidAssigned { id: id.clone(), pid })
        })
    }

    pub fn end_session(&self, id: &SessionId, exit_code: Option<i32>) -> Result<(), StoreError> {
        self.transact(|state, wal, now, _ids| {
            emit(
                state,
                wal,
                Event::SessionEnded {
                    id: id.clone(),
                    ended_at: now,
                    exit_code,
                },
            )
        })
    }

    // ---- Merge Gate (§4.8) ------------------------------------------------

    pub fn acquire_base_branch_lock(&self, base_branch: &str, holder: &str) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if let Some(existing) = state.base_branch_locks.get(base_branch) {
                if existing != holder {
                    return Err(StoreError::BaseBranchLocked(
                        base_branch.to_string(),
                        existing.clone(),
                    ));
                }
                return Ok(());
            }
            emit(
                state,
                wal,
                Event::BaseBranchLockAcquired {
                    base_branch: base_branch.to_string(),
                    holder: holder.to_string(),
                },
            )
        })
    }

    pub fn release_base_branch_lock(&self, base_branch: &str) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            emit(
                state,
                wal,
                Event::BaseBranchLockReleased {
                    base_branch: base_branch.to_string(),
                },
            )
        })
    }

    /// Step 1-2 of `complete` (spec §4.8): append the final progress note
    /// and transition the work item to `done`. The merge flow itself
    /// (`switch`, test command, git plumbing) lives in
    /// `railyard-engine::merge_gate` and calls back into `Store` for the
    /// base-branch lock and `unblock_dependents`.
    pub fn complete(
        &self,
        id: &WorkItemId,
        engine_id: &EngineId,
        summary: &str,
    ) -> Result<WorkItem, StoreError> {
        self.transact(|state, wal, now, _ids| {
            let item = state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))?;
            emit(
                state,
                wal,
                Event::ProgressNoteAdded {
                    work_item_id: id.clone(),
                    cycle: item.cycle_count,
                    engine_id: engine_id.as_str().to_string(),
                    note: summary.to_string(),
                    created_at: now,
                },
            )?;
            emit(state, wal, Event::WorkItemCompleted { id: id.clone(), at: now })?;
            state
                .get_work_item(id)
                .cloned()
                .ok_or_else(|| StoreError::WorkItemNotFound(id.clone()))
        })
    }

    /// Step 5 of `complete`: re-evaluate every dependent of `id` and open
    /// any that are `blocked` with no remaining unmet blocker.
    pub fn unblock_dependents(&self, id: &WorkItemId) -> Result<Vec<WorkItemId>, StoreError> {
        self.transact(|state, wal, now, _ids| {
            let mut unblocked = Vec::new();
            for dependent in state.dependents_of(id) {
                let is_blocked = state
                    .get_work_item(&dependent)
                    .map(|w| w.status == WorkItemStatus::Blocked)
                    .unwrap_or(false);
                if is_blocked && state.all_blockers_done(&dependent) {
                    emit(
                        state,
                        wal,
                        Event::WorkItemStatusChanged {
                            id: dependent.clone(),
                            status: WorkItemStatus::Open,
                            at: now,
                        },
                    )?;
                    unblocked.push(dependent);
                }
            }
            Ok(unblocked)
        })
    }

    // ---- Track seeding (config bootstrap) --------------------------------

    /// Seed or update `track`'s row. A no-op (no WAL append) when the track
    /// is already present with identical fields, so re-running this on
    /// every config-driven CLI invocation (see `railyard`'s
    /// `main.rs::sync_tracks`) doesn't grow the log unboundedly.
    pub fn seed_track(&self, track: Track) -> Result<(), StoreError> {
        self.transact(|state, wal, _now, _ids| {
            if state.tracks.get(&track.name) == Some(&track) {
                return Ok(());
            }
            emit(state, wal, Event::TrackSeeded { track: track.clone() })
        })
    }

    pub fn get_track(&self, name: &str) -> Result<Option<Track>, StoreError> {
        self.transact(|state, _wal, _now, _ids| Ok(state.tracks.get(name).cloned()))
    }
}

fn emit(state: &mut MaterializedState, wal: &mut Wal, event: Event) -> Result<(), StoreError> {
    wal.append(&event)?;
    state.apply_event(&event);
    Ok(())
}

/// Release a dead or deregistering engine's claimed work item back to
/// `open` (spec §4.2: "releasing any claimed work item owned by the dead
/// engine back to open").
fn release_orphan_claim(
    state: &mut MaterializedState,
    wal: &mut Wal,
    engine_id: &EngineId,
    now: i64,
) -> Result<(), StoreError> {
    let Some(engine) = state.engines.get(engine_id).cloned() else {
        return Ok(());
    };
    let Some(car_id) = engine.current_car else {
        return Ok(());
    };
    let claimed = state
        .get_work_item(&car_id)
        .map(|w| matches!(w.status, WorkItemStatus::Claimed | WorkItemStatus::InProgress))
        .unwrap_or(false);
    if claimed {
        emit(state, wal, Event::WorkItemReleased { id: car_id.clone(), at: now })?;
        emit(
            state,
            wal,
            Event::WorkItemStatusChanged {
                id: car_id,
                status: WorkItemStatus::Open,
                at: now,
            },
        )?;
    }
    Ok(())
}

/// Opportunistic dead-engine sweep (SPEC_FULL §4.2): invoked at the top of
/// `claim` so a single-process harness needs no separate reaper task.
fn reap_dead_engines(state: &mut MaterializedState, wal: &mut Wal, now: i64) -> Result<(), StoreError> {
    for engine_id in state.dead_engines(now) {
        release_orphan_claim(state, wal, &engine_id, now)?;
        emit(
            state,
            wal,
            Event::EngineStatusChanged {
                id: engine_id,
                status: EngineStatus::Dead,
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
