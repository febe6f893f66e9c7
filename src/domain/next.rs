//! Next-task selection
//!
//! Resumes the deepest active thread of work: starting from the oldest
//! in-progress leaf, look at its children, then its siblings, then climb to
//! its parent and repeat. With no in-progress work anywhere, every eligible
//! root is offered as a candidate instead of guessing.

use serde::Serialize;
use std::collections::HashSet;

use super::graph::{sort_by_created, TaskGraph};
use super::id::TaskId;
use super::task::Task;

/// Options for [`select_next`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NextOptions {
    /// Skip tasks that have an owner
    pub unclaimed_only: bool,
}

/// Recommendation returned by [`select_next`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum NextTask {
    /// A single task continuing the active thread
    Task { task: Task },

    /// Eligible root tasks when no thread is active, oldest first
    Candidates { tasks: Vec<Task> },

    /// Nothing eligible; `blocked_count` todo tasks are waiting on blockers
    Empty { blocked_count: usize },
}

impl NextTask {
    pub fn is_empty(&self) -> bool {
        matches!(self, NextTask::Empty { .. })
    }
}

/// Picks what to work on next
pub fn select_next(graph: &TaskGraph, options: NextOptions) -> NextTask {
    let eligible = |task: &&Task| {
        task.status.is_todo()
            && !graph.is_blocked(task)
            && (!options.unclaimed_only || task.is_unowned())
    };

    if let Some(anchor) = find_anchor(graph) {
        if let Some(task) = walk_from(graph, anchor, &eligible) {
            return NextTask::Task { task: task.clone() };
        }
    } else {
        let candidates: Vec<Task> = graph
            .roots()
            .into_iter()
            .filter(eligible)
            .cloned()
            .collect();
        if !candidates.is_empty() {
            return NextTask::Candidates { tasks: candidates };
        }
    }

    let blocked_count = graph
        .tasks()
        .filter(|t| t.status.is_todo() && graph.is_blocked(t))
        .filter(|t| !options.unclaimed_only || t.is_unowned())
        .count();

    NextTask::Empty { blocked_count }
}

/// Oldest in-progress task with no in-progress child
fn find_anchor(graph: &TaskGraph) -> Option<&Task> {
    let mut leaves: Vec<&Task> = graph
        .tasks()
        .filter(|t| t.status.is_in_progress())
        .filter(|t| {
            !graph
                .children(&t.id)
                .iter()
                .any(|c| c.status.is_in_progress())
        })
        .collect();

    sort_by_created(&mut leaves);
    leaves.into_iter().next()
}

fn walk_from<'a>(
    graph: &'a TaskGraph,
    mut anchor: &'a Task,
    eligible: &impl Fn(&&Task) -> bool,
) -> Option<&'a Task> {
    let mut visited: HashSet<&TaskId> = HashSet::new();

    loop {
        if !visited.insert(&anchor.id) {
            return None;
        }

        // children and siblings come back already ordered by creation
        if let Some(child) = graph.children(&anchor.id).into_iter().find(eligible) {
            return Some(child);
        }
        if let Some(sibling) = graph.siblings(&anchor.id).into_iter().find(eligible) {
            return Some(sibling);
        }

        anchor = graph.parent_of(&anchor.id)?;
    }
}
