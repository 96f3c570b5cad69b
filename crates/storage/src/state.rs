// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state derived from replaying the event log (§3).
//!
//! `MaterializedState` is a plain in-memory cache: every field is a `HashMap`
//! or `Vec` over `railyard_core` entities, mutated exclusively through
//! [`MaterializedState::apply_event`]. The WAL on disk is the source of
//! truth; this struct is rebuilt from the latest snapshot + WAL suffix
//! whenever a process (re)acquires the store lock (see `crate::store`).

use crate::event::Event;
use railyard_core::{
    would_cycle, BroadcastAck, Dependency, Engine, EngineId, Message, MessageId, ProgressNote,
    Session, SessionId, Track, WorkItem, WorkItemId, WorkItemStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Plain-collection cache of every entity from spec §3, rebuilt by replaying
/// [`Event`]s from an empty default.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub tracks: HashMap<String, Track>,
    pub work_items: HashMap<WorkItemId, WorkItem>,
    pub dependencies: Vec<Dependency>,
    pub progress_notes: HashMap<WorkItemId, Vec<ProgressNote>>,
    pub engines: HashMap<EngineId, Engine>,
    pub messages: HashMap<MessageId, Message>,
    pub broadcast_acks: Vec<BroadcastAck>,
    pub sessions: HashMap<SessionId, Session>,
    /// `base_branch -> holder` advisory lock rows for the Merge Gate (§5:
    /// "MG serializes operations on the base branch by taking an advisory
    /// lock row in PS keyed by `base_branch`").
    pub base_branch_locks: HashMap<String, String>,
}

impl MaterializedState {
    pub fn get_work_item(&self, id: &WorkItemId) -> Option<&WorkItem> {
        self.work_items.get(id)
    }

    /// Work items that list `id` as a `blocks` blocker.
    pub fn dependents_of(&self, id: &WorkItemId) -> Vec<WorkItemId> {
        self.dependencies
            .iter()
            .filter(|d| &d.blocked_by == id && d.dep_type == railyard_core::DependencyType::Blocks)
            .map(|d| d.work_item_id.clone())
            .collect()
    }

    /// Direct children of an epic (`parent_id == Some(id)`).
    pub fn children_of(&self, id: &WorkItemId) -> Vec<&WorkItem> {
        let mut out: Vec<&WorkItem> = self
            .work_items
            .values()
            .filter(|w| w.parent_id.as_ref() == Some(id))
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    /// Whether every `blocks` blocker of `id` is `done`.
    pub fn all_blockers_done(&self, id: &WorkItemId) -> bool {
        self.dependencies
            .iter()
            .filter(|d| &d.work_item_id == id && d.dep_type == railyard_core::DependencyType::Blocks)
            .all(|d| {
                self.work_items
                    .get(&d.blocked_by)
                    .map(|w| w.status == WorkItemStatus::Done)
                    .unwrap_or(false)
            })
    }

    /// The `ready` set (§4.1): `open`, unassigned, every blocker `done`.
    /// Ordered priority ascending, then `created_at` ascending, then id.
    pub fn ready(&self, track: Option<&str>) -> Vec<&WorkItem> {
        let mut items: Vec<&WorkItem> = self
            .work_items
            .values()
            .filter(|w| w.status == WorkItemStatus::Open && w.assignee.is_none())
            .filter(|w| track.map(|t| w.track == t).unwrap_or(true))
            .filter(|w| self.all_blockers_done(&w.id))
            .collect();
        items.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.as_str().cmp(b.id.as_str()))
        });
        items
    }

    /// Current `blocked_by` edges as `(work_item_id, blocked_by)` pairs, for
    /// cycle detection ahead of adding a new `blocks` edge.
    pub fn block_edges(&self) -> Vec<(WorkItemId, WorkItemId)> {
        self.dependencies
            .iter()
            .filter(|d| d.dep_type == railyard_core::DependencyType::Blocks)
            .map(|d| (d.work_item_id.clone(), d.blocked_by.clone()))
            .collect()
    }

    pub fn would_introduce_cycle(&self, work_item_id: &WorkItemId, blocked_by: &WorkItemId) -> bool {
        would_cycle(&self.block_edges(), work_item_id, blocked_by)
    }

    /// Unacknowledged messages for `agent`, urgent-first then by
    /// `created_at` (§4.3).
    pub fn inbox(&self, agent: &str) -> Vec<&Message> {
        let mut msgs: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| {
                if m.is_broadcast() {
                    !self
                        .broadcast_acks
                        .iter()
                        .any(|a| a.message_id == m.id && a.recipient == agent)
                } else {
                    m.to_agent == agent && !m.acknowledged
                }
            })
            .collect();
        msgs.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
        });
        msgs
    }

    pub fn thread(&self, thread_id: &railyard_core::ThreadId) -> Vec<&Message> {
        let mut msgs: Vec<&Message> = self
            .messages
            .values()
            .filter(|m| m.thread_id.as_ref() == Some(thread_id))
            .collect();
        msgs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        msgs
    }

    /// Engines whose `last_activity` is stale at `now_ms` (§4.2).
    pub fn dead_engines(&self, now_ms: i64) -> Vec<EngineId> {
        self.engines
            .values()
            .filter(|e| e.is_dead_at(now_ms))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Apply one event to the cached state. Idempotent: replaying the same
    /// event twice must not change the result (crash recovery may replay the
    /// WAL suffix more than once if a process dies between apply and the
    /// next snapshot).
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::TrackSeeded { track } => {
                self.tracks.insert(track.name.clone(), track.clone());
            }

            Event::WorkItemCreated {
                id,
                title,
                item_type,
                priority,
                track,
                branch,
                base_branch,
                parent_id,
                description,
                acceptance_criteria,
                design_notes,
                skip_tests,
                status,
                created_at,
            } => {
                self.work_items.entry(id.clone()).or_insert(WorkItem {
                    id: id.clone(),
                    title: title.clone(),
                    item_type: *item_type,
                    priority: *priority,
                    status: *status,
                    claimed_at: None,
                    completed_at: None,
                    track: track.clone(),
                    branch: branch.clone(),
                    base_branch: base_branch.clone(),
                    parent_id: parent_id.clone(),
                    description: description.clone(),
                    acceptance_criteria: acceptance_criteria.clone(),
                    design_notes: design_notes.clone(),
                    assignee: None,
                    skip_tests: *skip_tests,
                    created_at: *created_at,
                    cycle_count: 0,
                });
            }

            Event::WorkItemStatusChanged { id, status, at } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.status = *status;
                    match status {
                        WorkItemStatus::Claimed => w.claimed_at = Some(*at),
                        WorkItemStatus::Done => w.completed_at = Some(*at),
                        _ => {}
                    }
                }
            }

            Event::WorkItemAssigned { id, engine_id, at } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.assignee = Some(engine_id.clone());
                    w.claimed_at = Some(*at);
                }
            }

            Event::WorkItemReleased { id, .. } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.assignee = None;
                }
            }

            Event::WorkItemFieldsUpdated {
                id,
                title,
                description,
                acceptance_criteria,
                design_notes,
                priority,
                skip_tests,
            } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    if let Some(v) = title {
                        w.title = v.clone();
                    }
                    if let Some(v) = description {
                        w.description = v.clone();
                    }
                    if let Some(v) = acceptance_criteria {
                        w.acceptance_criteria = v.clone();
                    }
                    if let Some(v) = design_notes {
                        w.design_notes = v.clone();
                    }
                    if let Some(v) = priority {
                        w.priority = *v;
                    }
                    if let Some(v) = skip_tests {
                        w.skip_tests = *v;
                    }
                }
            }

            Event::WorkItemCompleted { id, at } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.status = WorkItemStatus::Done;
                    w.completed_at = Some(*at);
                    w.assignee = None;
                }
            }

            Event::WorkItemCycleIncremented { id } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.cycle_count += 1;
                }
            }

            Event::WorkItemCycleReset { id } => {
                if let Some(w) = self.work_items.get_mut(id) {
                    w.cycle_count = 0;
                }
            }

            Event::DependencyAdded {
                work_item_id,
                blocked_by,
                dep_type,
            } => {
                let exists = self.dependencies.iter().any(|d| {
                    &d.work_item_id == work_item_id && &d.blocked_by == blocked_by
                });
                if !exists {
                    self.dependencies.push(Dependency {
                        work_item_id: work_item_id.clone(),
                        blocked_by: blocked_by.clone(),
                        dep_type: *dep_type,
                    });
                }
            }

            Event::DependencyRemoved {
                work_item_id,
                blocked_by,
            } => {
                self.dependencies
                    .retain(|d| !(&d.work_item_id == work_item_id && &d.blocked_by == blocked_by));
            }

            Event::ProgressNoteAdded {
                work_item_id,
                cycle,
                engine_id,
                note,
                created_at,
            } => {
                self.progress_notes
                    .entry(work_item_id.clone())
                    .or_default()
                    .push(ProgressNote {
                        work_item_id: work_item_id.clone(),
                        cycle: *cycle,
                        engine_id: EngineId::new(engine_id.clone()),
                        note: note.clone(),
                        created_at: *created_at,
                    });
            }

            Event::EngineRegistered { id, track, at } => {
                self.engines
                    .insert(id.clone(), Engine::register(id.clone(), track.clone(), *at));
            }

            Event::EngineHeartbeat { id, at, status } => {
                if let Some(e) = self.engines.get_mut(id) {
                    e.last_activity = *at;
                    e.status = *status;
                }
            }

            Event::EngineStatusChanged { id, status } => {
                if let Some(e) = self.engines.get_mut(id) {
                    e.status = *status;
                }
            }

            Event::EngineCurrentCarChanged { id, current_car } => {
                if let Some(e) = self.engines.get_mut(id) {
                    e.current_car = current_car.clone();
                }
            }

            Event::EngineDeregistered { id } => {
                self.engines.remove(id);
            }

            Event::MessageSent {
                id,
                from_agent,
                to_agent,
                subject,
                body,
                priority,
                thread_id,
                car_id,
                created_at,
            } => {
                self.messages.entry(id.clone()).or_insert(Message {
                    id: id.clone(),
                    from_agent: from_agent.clone(),
                    to_agent: to_agent.clone(),
                    subject: subject.clone(),
                    body: body.clone(),
                    priority: *priority,
                    thread_id: thread_id.clone(),
                    car_id: car_id.clone(),
                    acknowledged: false,
                    created_at: *created_at,
                });
            }

            Event::MessageAcknowledged { id } => {
                if let Some(m) = self.messages.get_mut(id) {
                    m.acknowledged = true;
                }
            }

            Event::BroadcastAcknowledged { id, recipient } => {
                let exists = self
                    .broadcast_acks
                    .iter()
                    .any(|a| &a.message_id == id && &a.recipient == recipient);
                if !exists {
                    self.broadcast_acks.push(BroadcastAck {
                        message_id: id.clone(),
                        recipient: recipient.clone(),
                    });
                }
            }

            Event::SessionStarted {
                id,
                engine_id,
                car_id,
                started_at,
            } => {
                self.sessions.entry(id.clone()).or_insert_with(|| {
                    Session::start(id.clone(), engine_id.clone(), car_id.clone(), *started_at)
                });
            }

            Event::SessionPidAssigned { id, pid } => {
                if let Some(s) = self.sessions.get_mut(id) {
                    s.pid = Some(*pid);
                }
            }

            Event::SessionEnded {
                id,
                ended_at,
                exit_code,
            } => {
                if let Some(s) = self.sessions.get_mut(id) {
                    s.ended_at = Some(*ended_at);
                    s.exit_code = *exit_code;
                }
            }

            Event::BaseBranchLockAcquired {
                base_branch,
                holder,
            } => {
                self.base_branch_locks
                    .insert(base_branch.clone(), holder.clone());
            }

            Event::BaseBranchLockReleased { base_branch } => {
                self.base_branch_locks.remove(base_branch);
            }
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
