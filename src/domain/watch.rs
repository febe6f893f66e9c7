//! Snapshot diffing for `watch`
//!
//! A watcher keeps the last observed task set and turns each reload into
//! `added` / `updated` / `deleted` events. A task counts as updated when its
//! `updated` timestamp moved.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use super::graph::sort_by_created;
use super::id::TaskId;
use super::task::{Task, TaskStatus};

/// One change between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    Snapshot {
        tasks: Vec<Task>,
        timestamp: DateTime<Utc>,
    },
    Added {
        task: Task,
        timestamp: DateTime<Utc>,
    },
    Updated {
        task: Task,
        timestamp: DateTime<Utc>,
    },
    Deleted {
        #[serde(rename = "taskId")]
        task_id: TaskId,
        timestamp: DateTime<Utc>,
    },
}

/// Last observed task set, optionally narrowed to one status
#[derive(Debug, Default)]
pub struct Snapshot {
    status: Option<TaskStatus>,
    tasks: Option<BTreeMap<TaskId, Task>>,
}

impl Snapshot {
    pub fn new(status: Option<TaskStatus>) -> Self {
        Self {
            status,
            tasks: None,
        }
    }

    /// Replaces the snapshot and returns what changed
    ///
    /// The first call yields a single `snapshot` event with every task.
    /// Tasks leaving the status filter are reported as deleted.
    pub fn advance(&mut self, tasks: Vec<Task>, now: DateTime<Utc>) -> Vec<WatchEvent> {
        let current: BTreeMap<TaskId, Task> = tasks
            .into_iter()
            .filter(|t| self.status.map_or(true, |s| t.status == s))
            .map(|t| (t.id.clone(), t))
            .collect();

        let events = match &self.tasks {
            None => {
                let mut ordered: Vec<&Task> = current.values().collect();
                sort_by_created(&mut ordered);
                vec![WatchEvent::Snapshot {
                    tasks: ordered.into_iter().cloned().collect(),
                    timestamp: now,
                }]
            }
            Some(previous) => diff(previous, &current, now),
        };

        self.tasks = Some(current);
        events
    }
}

fn diff(
    previous: &BTreeMap<TaskId, Task>,
    current: &BTreeMap<TaskId, Task>,
    now: DateTime<Utc>,
) -> Vec<WatchEvent> {
    let mut added: Vec<&Task> = Vec::new();
    let mut updated: Vec<&Task> = Vec::new();

    for (id, task) in current {
        match previous.get(id) {
            None => added.push(task),
            Some(before) if before.updated != task.updated => updated.push(task),
            Some(_) => {}
        }
    }
    sort_by_created(&mut added);
    sort_by_created(&mut updated);

    let mut events: Vec<WatchEvent> = added
        .into_iter()
        .map(|t| WatchEvent::Added {
            task: t.clone(),
            timestamp: now,
        })
        .collect();
    events.extend(updated.into_iter().map(|t| WatchEvent::Updated {
        task: t.clone(),
        timestamp: now,
    }));
    events.extend(
        previous
            .keys()
            .filter(|id| !current.contains_key(*id))
            .map(|id| WatchEvent::Deleted {
                task_id: id.clone(),
                timestamp: now,
            }),
    );
    events
}
