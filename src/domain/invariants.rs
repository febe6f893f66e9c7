//! Structural predicates and whole-graph consistency checks
//!
//! The two `would_create_*` predicates are consulted before an edge is
//! written. [`check`] audits a loaded graph after the fact, which matters for
//! data edited by hand or written by older versions.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::graph::{DependencyGraph, TaskGraph};
use super::id::TaskId;

/// Returns true if making `parent` the parent of `child` would close a loop
///
/// Walks upward from `parent`. Reaching `child`, or revisiting any node
/// (pre-existing corruption), counts as a cycle. A missing parent ends the
/// walk like a root does.
pub fn would_create_parent_cycle(graph: &TaskGraph, child: &TaskId, parent: &TaskId) -> bool {
    let mut visited = HashSet::new();
    let mut current = Some(parent.clone());

    while let Some(id) = current {
        if &id == child || !visited.insert(id.clone()) {
            return true;
        }
        current = graph.get(&id).and_then(|t| t.parent.clone());
    }

    false
}

/// Returns true if making `blocked` wait on `blocker` would close a loop
///
/// That happens exactly when `blocked` is already reachable from `blocker`
/// through existing blocker edges.
pub fn would_create_block_cycle(graph: &TaskGraph, blocker: &TaskId, blocked: &TaskId) -> bool {
    blocker == blocked || DependencyGraph::from_graph(graph).reaches(blocker, blocked)
}

/// One inconsistency found by [`check`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    ParentCycle { tasks: Vec<TaskId> },
    BlockCycle { tasks: Vec<TaskId> },
    DoneWithUndoneChildren { task: TaskId, undone: Vec<TaskId> },
    InProgressWhileBlocked { task: TaskId, blockers: Vec<TaskId> },
    DanglingParent { task: TaskId, parent: TaskId },
    DanglingBlocker { task: TaskId, blocker: TaskId },
}

impl Violation {
    pub fn describe(&self) -> String {
        fn list(ids: &[TaskId]) -> String {
            ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
        }

        match self {
            Violation::ParentCycle { tasks } => format!("parent cycle through {}", list(tasks)),
            Violation::BlockCycle { tasks } => format!("blocking cycle through {}", list(tasks)),
            Violation::DoneWithUndoneChildren { task, undone } => {
                format!("{task} is done but has undone children: {}", list(undone))
            }
            Violation::InProgressWhileBlocked { task, blockers } => {
                format!("{task} is in progress but blocked by {}", list(blockers))
            }
            Violation::DanglingParent { task, parent } => {
                format!("{task} references missing parent {parent}")
            }
            Violation::DanglingBlocker { task, blocker } => {
                format!("{task} references missing blocker {blocker}")
            }
        }
    }
}

/// Audits a graph, returning every violation in a stable order
pub fn check(graph: &TaskGraph) -> Vec<Violation> {
    let mut found = BTreeSet::new();

    for tasks in parent_cycles(graph) {
        found.insert(Violation::ParentCycle { tasks });
    }
    for tasks in DependencyGraph::from_graph(graph).cycles() {
        found.insert(Violation::BlockCycle { tasks });
    }

    for task in graph.tasks() {
        if task.status.is_done() {
            let mut undone: Vec<TaskId> = graph
                .undone_descendants(&task.id)
                .into_iter()
                .map(|t| t.id.clone())
                .collect();
            if !undone.is_empty() {
                undone.sort();
                found.insert(Violation::DoneWithUndoneChildren {
                    task: task.id.clone(),
                    undone,
                });
            }
        }

        if task.status.is_in_progress() {
            let mut blockers: Vec<TaskId> =
                graph.unresolved_blockers(task).into_iter().cloned().collect();
            if !blockers.is_empty() {
                blockers.sort();
                found.insert(Violation::InProgressWhileBlocked {
                    task: task.id.clone(),
                    blockers,
                });
            }
        }

        if let Some(parent) = &task.parent {
            if !graph.contains(parent) {
                found.insert(Violation::DanglingParent {
                    task: task.id.clone(),
                    parent: parent.clone(),
                });
            }
        }

        for blocker in &task.blocked_by {
            if !graph.contains(blocker) {
                found.insert(Violation::DanglingBlocker {
                    task: task.id.clone(),
                    blocker: blocker.clone(),
                });
            }
        }
    }

    found.into_iter().collect()
}

/// Distinct loops in the parent relation, each as a sorted ID list
fn parent_cycles(graph: &TaskGraph) -> BTreeSet<Vec<TaskId>> {
    let mut cycles = BTreeSet::new();
    let mut cleared: HashSet<TaskId> = HashSet::new();

    for task in graph.tasks() {
        let mut path: Vec<TaskId> = Vec::new();
        let mut current = Some(task.id.clone());

        while let Some(id) = current {
            if cleared.contains(&id) {
                break;
            }
            if let Some(pos) = path.iter().position(|p| p == &id) {
                let mut cycle = path[pos..].to_vec();
                cycle.sort();
                cycles.insert(cycle);
                break;
            }
            path.push(id.clone());
            current = graph.get(&id).and_then(|t| t.parent.clone());
        }

        cleared.extend(path);
    }

    cycles
}
