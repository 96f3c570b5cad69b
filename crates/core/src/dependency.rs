// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency edges between work items, and cycle detection over them.

use crate::car::WorkItemId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Enforced by the scheduler: blocked items are excluded from the ready set.
    Blocks,
    /// Informational only; never checked by `ready`.
    Relates,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyType::Blocks => write!(f, "blocks"),
            DependencyType::Relates => write!(f, "relates"),
        }
    }
}

/// A directed edge: `work_item_id` depends on `blocked_by`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub work_item_id: WorkItemId,
    pub blocked_by: WorkItemId,
    pub dep_type: DependencyType,
}

/// Returns true if adding `work_item_id -> blocked_by` to the graph described
/// by `edges` (existing `blocks` edges only, as `work_item_id -> blocked_by`
/// pairs) would introduce a cycle. Pure graph search; callers run it before
/// persisting a new edge and reject the edge on `true`.
pub fn would_cycle(
    edges: &[(WorkItemId, WorkItemId)],
    work_item_id: &WorkItemId,
    blocked_by: &WorkItemId,
) -> bool {
    if work_item_id == blocked_by {
        return true;
    }
    let mut adjacency: HashMap<&WorkItemId, Vec<&WorkItemId>> = HashMap::new();
    for (from, to) in edges {
        adjacency.entry(from).or_default().push(to);
    }
    adjacency.entry(work_item_id).or_default().push(blocked_by);

    // Cycle exists iff blocked_by can reach work_item_id via existing edges.
    let mut visited = HashSet::new();
    let mut stack = vec![blocked_by];
    while let Some(node) = stack.pop() {
        if node == work_item_id {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(node) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

#[cfg(test)]
#[path = "dependency_tests.rs"]
mod tests;
