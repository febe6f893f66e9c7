//! Edge and status rule validation
//!
//! Every function here is pure: it takes the current [`TaskGraph`] and
//! returns the tasks that must be written, or the first rule that forbids the
//! change. Nothing is persisted until the caller commits the result.

use chrono::{DateTime, Utc};

use super::graph::{GraphError, TaskGraph};
use super::id::TaskId;
use super::invariants::{would_create_block_cycle, would_create_parent_cycle};
use super::task::{Task, TaskStatus};

/// Outcome of a validated status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    /// The task with its new status
    pub task: Task,

    /// Former dependents with the completed task removed from `blocked_by`
    pub released: Vec<Task>,
}

impl StatusChange {
    /// All tasks to persist, the changed task first
    pub fn into_tasks(self) -> Vec<Task> {
        let mut tasks = Vec::with_capacity(self.released.len() + 1);
        tasks.push(self.task);
        tasks.extend(self.released);
        tasks
    }
}

/// Validates setting `parent` as the parent of `child`
///
/// Checks, in order: self-reference, existence of both tasks, a done
/// parent, then cycles.
pub fn set_parent(
    graph: &TaskGraph,
    child: &TaskId,
    parent: &TaskId,
    now: DateTime<Utc>,
) -> Result<Task, GraphError> {
    if child == parent {
        return Err(GraphError::SelfParent(child.clone()));
    }

    let child_task = graph.require(child)?;
    let parent_task = graph.require(parent)?;

    if parent_task.status.is_done() {
        return Err(GraphError::ParentDone(parent.clone()));
    }
    if would_create_parent_cycle(graph, child, parent) {
        return Err(GraphError::ParentCycle {
            child: child.clone(),
            parent: parent.clone(),
        });
    }

    let mut updated = child_task.clone();
    updated.parent = Some(parent.clone());
    updated.touch(now);
    Ok(updated)
}

/// Clears the parent of a task; a root stays unchanged
pub fn clear_parent(graph: &TaskGraph, child: &TaskId, now: DateTime<Utc>) -> Result<Task, GraphError> {
    let mut updated = graph.require(child)?.clone();
    if updated.parent.take().is_some() {
        updated.touch(now);
    }
    Ok(updated)
}

/// Validates making `blocked` wait on `blocker`
///
/// Checks, in order: self-reference, existence, a done blocker, cycles,
/// duplicates, then an in-progress target.
pub fn add_blocker(
    graph: &TaskGraph,
    blocker: &TaskId,
    blocked: &TaskId,
    now: DateTime<Utc>,
) -> Result<Task, GraphError> {
    if blocker == blocked {
        return Err(GraphError::SelfBlock(blocker.clone()));
    }

    let blocker_task = graph.require(blocker)?;
    let blocked_task = graph.require(blocked)?;

    if blocker_task.status.is_done() {
        return Err(GraphError::BlockerDone(blocker.clone()));
    }
    if would_create_block_cycle(graph, blocker, blocked) {
        return Err(GraphError::BlockCycle {
            blocker: blocker.clone(),
            blocked: blocked.clone(),
        });
    }
    if blocked_task.blocked_by.contains(blocker) {
        return Err(GraphError::AlreadyBlocked {
            blocker: blocker.clone(),
            blocked: blocked.clone(),
        });
    }
    if blocked_task.status.is_in_progress() {
        return Err(GraphError::InProgressBlock {
            blocker: blocker.clone(),
            blocked: blocked.clone(),
        });
    }

    let mut updated = blocked_task.clone();
    updated.blocked_by.insert(blocker.clone());
    updated.touch(now);
    Ok(updated)
}

/// Validates removing `blocker` from the `blocked_by` set of `blocked`
///
/// The blocker itself may already be gone; only the blocked task must exist.
pub fn remove_blocker(
    graph: &TaskGraph,
    blocker: &TaskId,
    blocked: &TaskId,
    now: DateTime<Utc>,
) -> Result<Task, GraphError> {
    let mut updated = graph.require(blocked)?.clone();

    if !updated.blocked_by.remove(blocker) {
        return Err(GraphError::NotBlocked {
            blocker: blocker.clone(),
            blocked: blocked.clone(),
        });
    }
    updated.touch(now);
    Ok(updated)
}

/// Validates a status change and computes its cascade
///
/// Entering `in-progress` requires the task to be unblocked; entering `done`
/// requires every descendant to be done and removes the task from the
/// `blocked_by` set of all its dependents. Moving back to `todo` or
/// `in-progress` does not check the parent.
pub fn change_status(
    graph: &TaskGraph,
    id: &TaskId,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<StatusChange, GraphError> {
    let current = graph.require(id)?;

    match status {
        TaskStatus::InProgress => {
            let blockers: Vec<TaskId> = graph.unresolved_blockers(current).into_iter().cloned().collect();
            if !blockers.is_empty() {
                return Err(GraphError::Blocked {
                    id: id.clone(),
                    blockers,
                });
            }
        }
        TaskStatus::Done => {
            let undone: Vec<TaskId> = graph
                .undone_descendants(id)
                .into_iter()
                .map(|t| t.id.clone())
                .collect();
            if !undone.is_empty() {
                return Err(GraphError::IncompleteChildren {
                    id: id.clone(),
                    undone,
                });
            }
        }
        TaskStatus::Todo => {}
    }

    let mut task = current.clone();
    task.status = status;
    task.touch(now);

    let released = if status.is_done() {
        graph
            .dependents(id)
            .into_iter()
            .map(|dependent| {
                let mut dependent = dependent.clone();
                dependent.blocked_by.remove(id);
                dependent.touch(now);
                dependent
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(StatusChange { task, released })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    fn task(name: &str, offset: i64) -> Task {
        Task::new(id(name), name, base() + Duration::seconds(offset))
    }

    fn now() -> DateTime<Utc> {
        base() + Duration::hours(1)
    }

    #[test]
    fn set_parent_rejects_self_first() {
        let graph = TaskGraph::from_tasks(vec![]);
        assert_eq!(
            set_parent(&graph, &id("a"), &id("a"), now()),
            Err(GraphError::SelfParent(id("a")))
        );
    }

    #[test]
    fn set_parent_requires_both_tasks() {
        let graph = TaskGraph::from_tasks(vec![task("a", 0)]);
        assert_eq!(
            set_parent(&graph, &id("a"), &id("zz"), now()),
            Err(GraphError::TaskNotFound(id("zz")))
        );
        assert_eq!(
            set_parent(&graph, &id("zz"), &id("a"), now()),
            Err(GraphError::TaskNotFound(id("zz")))
        );
    }

    #[test]
    fn set_parent_rejects_done_parent() {
        let mut p = task("p", 0);
        p.status = TaskStatus::Done;
        let graph = TaskGraph::from_tasks(vec![p, task("c", 1)]);

        assert_eq!(
            set_parent(&graph, &id("c"), &id("p"), now()),
            Err(GraphError::ParentDone(id("p")))
        );
    }

    #[test]
    fn set_parent_rejects_cycle() {
        let a = task("a", 0);
        let mut b = task("b", 1);
        b.parent = Some(id("a"));
        let graph = TaskGraph::from_tasks(vec![a, b]);

        let err = set_parent(&graph, &id("a"), &id("b"), now()).unwrap_err();
        assert!(err.is_cycle());
    }

    #[test]
    fn set_parent_updates_timestamp() {
        let graph = TaskGraph::from_tasks(vec![task("p", 0), task("c", 1)]);
        let updated = set_parent(&graph, &id("c"), &id("p"), now()).unwrap();

        assert_eq!(updated.parent, Some(id("p")));
        assert_eq!(updated.updated, now());
    }

    #[test]
    fn clear_parent_is_idempotent() {
        let graph = TaskGraph::from_tasks(vec![task("a", 0)]);
        let cleared = clear_parent(&graph, &id("a"), now()).unwrap();
        assert!(cleared.parent.is_none());
        assert_eq!(cleared.updated, base());
    }

    #[test]
    fn add_blocker_checks_in_order() {
        let mut done = task("d", 0);
        done.status = TaskStatus::Done;
        let a = task("a", 1);
        let mut b = task("b", 2);
        b.blocked_by.insert(id("a"));
        let graph = TaskGraph::from_tasks(vec![done, a, b]);

        assert_eq!(
            add_blocker(&graph, &id("a"), &id("a"), now()),
            Err(GraphError::SelfBlock(id("a")))
        );
        assert_eq!(
            add_blocker(&graph, &id("zz"), &id("a"), now()),
            Err(GraphError::TaskNotFound(id("zz")))
        );
        assert_eq!(
            add_blocker(&graph, &id("d"), &id("a"), now()),
            Err(GraphError::BlockerDone(id("d")))
        );
        assert!(add_blocker(&graph, &id("b"), &id("a"), now())
            .unwrap_err()
            .is_cycle());
        assert_eq!(
            add_blocker(&graph, &id("a"), &id("b"), now()),
            Err(GraphError::AlreadyBlocked {
                blocker: id("a"),
                blocked: id("b")
            })
        );
    }

    #[test]
    fn add_blocker_rejects_in_progress_target() {
        let mut working = task("w", 0);
        working.status = TaskStatus::InProgress;
        let graph = TaskGraph::from_tasks(vec![working, task("x", 1)]);

        assert!(matches!(
            add_blocker(&graph, &id("x"), &id("w"), now()),
            Err(GraphError::InProgressBlock { .. })
        ));
    }

    #[test]
    fn remove_blocker_requires_existing_edge() {
        let mut b = task("b", 1);
        b.blocked_by.insert(id("gone"));
        let graph = TaskGraph::from_tasks(vec![task("a", 0), b]);

        assert!(matches!(
            remove_blocker(&graph, &id("a"), &id("b"), now()),
            Err(GraphError::NotBlocked { .. })
        ));

        let updated = remove_blocker(&graph, &id("gone"), &id("b"), now()).unwrap();
        assert!(updated.blocked_by.is_empty());
    }

    #[test]
    fn start_requires_unblocked() {
        let mut b = task("b", 1);
        b.blocked_by.insert(id("a"));
        let graph = TaskGraph::from_tasks(vec![task("a", 0), b]);

        assert_eq!(
            change_status(&graph, &id("b"), TaskStatus::InProgress, now()),
            Err(GraphError::Blocked {
                id: id("b"),
                blockers: vec![id("a")]
            })
        );
    }

    #[test]
    fn done_requires_done_descendants() {
        let p = task("p", 0);
        let mut c = task("c", 1);
        c.parent = Some(id("p"));
        let graph = TaskGraph::from_tasks(vec![p, c]);

        assert!(matches!(
            change_status(&graph, &id("p"), TaskStatus::Done, now()),
            Err(GraphError::IncompleteChildren { .. })
        ));
    }

    #[test]
    fn done_releases_dependents() {
        let mut b = task("b", 1);
        b.blocked_by.insert(id("a"));
        b.blocked_by.insert(id("other"));
        let graph = TaskGraph::from_tasks(vec![task("a", 0), b, task("other", 2)]);

        let change = change_status(&graph, &id("a"), TaskStatus::Done, now()).unwrap();
        assert_eq!(change.task.status, TaskStatus::Done);
        assert_eq!(change.released.len(), 1);
        assert!(!change.released[0].blocked_by.contains(&id("a")));
        assert!(change.released[0].blocked_by.contains(&id("other")));
        assert_eq!(change.into_tasks().len(), 2);
    }

    #[test]
    fn reopening_ignores_parent_status() {
        let mut p = task("p", 0);
        p.status = TaskStatus::Done;
        let mut c = task("c", 1);
        c.parent = Some(id("p"));
        c.status = TaskStatus::Done;
        let graph = TaskGraph::from_tasks(vec![p, c]);

        let change = change_status(&graph, &id("c"), TaskStatus::Todo, now()).unwrap();
        assert_eq!(change.task.status, TaskStatus::Todo);
        assert!(change.released.is_empty());
    }
}
