//! Task domain model
//!
//! A task sits in two independent relations at once: the parent/child
//! hierarchy (`parent`) and the blocking dependency graph (`blocked_by`).
//! Whether a task is *blocked* is never stored; it is derived from the
//! statuses of the tasks in `blocked_by` (see [`super::TaskGraph::is_blocked`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::TaskId;

/// Rejected status string at the input boundary
#[derive(Debug, Error, PartialEq)]
#[error("Invalid status '{0}'. Must be: todo, in-progress, done")]
pub struct ParseStatusError(pub String);

/// Status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// All statuses in display order
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Returns true if this status represents completion
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// Returns true if this task is not yet started
    pub fn is_todo(&self) -> bool {
        matches!(self, TaskStatus::Todo)
    }

    /// Returns true if this task is currently being worked on
    pub fn is_in_progress(&self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A timestamped annotation on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered set of task IDs a task waits on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<TaskId>", into = "Vec<TaskId>")]
pub struct BlockedBy(Vec<TaskId>);

impl BlockedBy {
    /// Creates an empty set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends an ID, returning false if it was already present
    pub fn insert(&mut self, id: TaskId) -> bool {
        if self.0.contains(&id) {
            false
        } else {
            self.0.push(id);
            true
        }
    }

    /// Removes an ID, returning true if it was present
    pub fn remove(&mut self, id: &TaskId) -> bool {
        let len_before = self.0.len();
        self.0.retain(|b| b != id);
        self.0.len() != len_before
    }

    /// Checks membership
    pub fn contains(&self, id: &TaskId) -> bool {
        self.0.contains(id)
    }

    /// Iterates in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &TaskId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<TaskId>> for BlockedBy {
    fn from(ids: Vec<TaskId>) -> Self {
        let mut set = BlockedBy::new();
        for id in ids {
            set.insert(id);
        }
        set
    }
}

impl From<BlockedBy> for Vec<TaskId> {
    fn from(set: BlockedBy) -> Self {
        set.0
    }
}

impl<'a> IntoIterator for &'a BlockedBy {
    type Item = &'a TaskId;
    type IntoIter = std::slice::Iter<'a, TaskId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, immutable after creation
    pub id: TaskId,

    /// Display name (non-empty)
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Progress notes, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,

    /// Parent in the decomposition tree; `None` for roots
    #[serde(default)]
    pub parent: Option<TaskId>,

    /// Current status
    pub status: TaskStatus,

    /// Tasks this one depends on
    #[serde(default, skip_serializing_if = "BlockedBy::is_empty")]
    pub blocked_by: BlockedBy,

    /// Advisory claimant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Creation time; the ordering key everywhere
    pub created: DateTime<Utc>,

    /// Last modification time
    pub updated: DateTime<Utc>,
}

impl Task {
    /// Creates a `todo` root task with no edges
    pub fn new(id: TaskId, name: impl Into<String>, created: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            notes: Vec::new(),
            parent: None,
            status: TaskStatus::Todo,
            blocked_by: BlockedBy::new(),
            owner: None,
            created,
            updated: created,
        }
    }

    /// Returns true if nobody has claimed this task
    pub fn is_unowned(&self) -> bool {
        self.owner.as_deref().map_or(true, str::is_empty)
    }

    /// Stable ordering key: creation time, then ID
    pub fn order_key(&self) -> (DateTime<Utc>, &TaskId) {
        (self.created, &self.id)
    }

    /// Marks the task as modified
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
    }

    /// Appends a note
    pub fn add_note(&mut self, content: impl Into<String>, now: DateTime<Utc>) {
        self.notes.push(Note {
            content: content.into(),
            timestamp: now,
        });
        self.touch(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    fn make_task(name: &str) -> Task {
        Task::new(id(name), name, Utc::now())
    }

    #[test]
    fn new_task_is_todo_root() {
        let task = make_task("a");
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.parent.is_none());
        assert!(task.blocked_by.is_empty());
        assert_eq!(task.created, task.updated);
    }

    #[test]
    fn status_parses_canonical_strings_only() {
        assert_eq!("todo".parse::<TaskStatus>(), Ok(TaskStatus::Todo));
        assert_eq!("in-progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!(" done ".parse::<TaskStatus>(), Ok(TaskStatus::Done));
        assert_eq!(
            "blocked".parse::<TaskStatus>(),
            Err(ParseStatusError("blocked".to_string()))
        );
        assert!("in_progress".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_display_matches_serde() {
        for status in TaskStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn blocked_by_is_an_ordered_set() {
        let mut set = BlockedBy::new();
        assert!(set.insert(id("b")));
        assert!(set.insert(id("a")));
        assert!(!set.insert(id("b")));

        let order: Vec<_> = set.iter().map(TaskId::as_str).collect();
        assert_eq!(order, vec!["b", "a"]);

        assert!(set.remove(&id("b")));
        assert!(!set.remove(&id("b")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn blocked_by_deserialization_drops_duplicates() {
        let set: BlockedBy = serde_json::from_str(r#"["a","b","a"]"#).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_owner_counts_as_unowned() {
        let mut task = make_task("a");
        assert!(task.is_unowned());

        task.owner = Some(String::new());
        assert!(task.is_unowned());

        task.owner = Some("agent-1".to_string());
        assert!(!task.is_unowned());
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let mut task = make_task("a");
        task.blocked_by.insert(id("b"));
        task.parent = Some(id("p"));

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["blockedBy"], serde_json::json!(["b"]));
        assert_eq!(value["parent"], serde_json::json!("p"));
        assert_eq!(value["status"], serde_json::json!("todo"));
        assert!(value.get("owner").is_none());
    }

    #[test]
    fn serde_roundtrip_keeps_every_field() {
        let now = Utc::now();
        let mut task = make_task("a");
        task.description = Some("Describe".to_string());
        task.add_note("first", now);
        task.parent = Some(id("p"));
        task.status = TaskStatus::InProgress;
        task.blocked_by.insert(id("b"));
        task.owner = Some("agent".to_string());

        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, task);
    }

    #[test]
    fn minimal_json_loads_with_defaults() {
        let json = r#"{"id":"a","name":"A","status":"todo","created":"2025-01-01T00:00:00Z","updated":"2025-01-01T00:00:00Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert!(task.parent.is_none());
        assert!(task.notes.is_empty());
        assert!(task.blocked_by.is_empty());
    }
}
