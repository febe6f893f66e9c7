//! # Task Engine
//!
//! Every command follows the same shape: load the full task set, validate
//! against the graph rules, then write all affected tasks in one
//! [`Changeset`]. A rejected command writes nothing.
//!
//! The engine holds no state between calls beyond its repository and clock,
//! so it can be constructed per command.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    self, select_next, transition, GraphError, IdError, NextOptions, NextTask, ParseStatusError,
    Task, TaskGraph, TaskId, TaskStatus, Violation,
};
use crate::storage::{Changeset, RepositoryError, TaskRepository};

/// Classified failure of an engine operation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    InvalidStatus(#[from] ParseStatusError),

    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error("{0} cannot be empty")]
    InvalidName(&'static str),

    #[error("Task {id} is already owned by {owner} (use --force to override)")]
    AlreadyClaimed { id: TaskId, owner: String },

    #[error("Task {0} has no owner")]
    NotClaimed(TaskId),

    #[error("Note cannot be empty")]
    EmptyNote,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    /// Returns a stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Graph(e) => e.kind(),
            EngineError::InvalidStatus(_) => "invalid_status",
            EngineError::InvalidId(_) => "invalid_id",
            EngineError::InvalidName(_) => "invalid_name",
            EngineError::AlreadyClaimed { .. } => "already_claimed",
            EngineError::NotClaimed(_) => "not_claimed",
            EngineError::EmptyNote => "empty_note",
            EngineError::Repository(RepositoryError::NotFound(_)) => "not_found",
            EngineError::Repository(_) => "repository",
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == "not_found"
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, EngineError::Graph(e) if e.is_cycle())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// What happens to the children of a deleted task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildPolicy {
    /// Refuse to delete a task that has children
    #[default]
    Reject,
    /// Children become roots
    Orphan,
    /// Children move up to the deleted task's parent
    Reparent,
    /// The whole subtree is deleted
    Cascade,
}

impl ChildPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildPolicy::Reject => "reject",
            ChildPolicy::Orphan => "orphan",
            ChildPolicy::Reparent => "reparent",
            ChildPolicy::Cascade => "cascade",
        }
    }
}

impl fmt::Display for ChildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChildPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(ChildPolicy::Reject),
            "orphan" => Ok(ChildPolicy::Orphan),
            "reparent" => Ok(ChildPolicy::Reparent),
            "cascade" => Ok(ChildPolicy::Cascade),
            other => Err(format!(
                "Invalid child policy '{other}'. Must be: reject, orphan, reparent, cascade"
            )),
        }
    }
}

/// Request for [`Engine::add_task`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub parent: Option<TaskId>,
}

impl NewTask {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Display-field changes for [`Engine::edit_task`]
///
/// An empty description clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Filters for [`Engine::list_tasks`]; all set fields must match
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<TaskStatus>,
    pub owner: Option<String>,
    pub unclaimed: bool,
    pub blocked: Option<bool>,
}

impl ListFilter {
    fn matches(&self, graph: &TaskGraph, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self
                .owner
                .as_deref()
                .map_or(true, |o| task.owner.as_deref() == Some(o))
            && (!self.unclaimed || task.is_unowned())
            && self.blocked.map_or(true, |b| graph.is_blocked(task) == b)
    }
}

/// A listed task with its derived blocked flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedTask {
    #[serde(flatten)]
    pub task: Task,
    pub blocked: bool,
}

/// A task with its derived relations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    #[serde(flatten)]
    pub task: Task,
    pub blocked: bool,
    pub unresolved_blockers: Vec<TaskId>,
    pub children: Vec<TaskId>,
    pub dependents: Vec<TaskId>,
}

/// Result of a status change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusOutcome {
    pub task: Task,
    /// Tasks that had this one removed from `blocked_by`
    pub unblocked: Vec<TaskId>,
}

/// Result of a deletion
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<TaskId>,
    /// Children moved to a new parent (or to the root level)
    pub moved: Vec<TaskId>,
}

/// A task and its visible children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TreeNode>,
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Operations over a task repository
pub struct Engine<R: TaskRepository> {
    repo: R,
    clock: Clock,
}

impl<R: TaskRepository> Engine<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, Utc::now)
    }

    /// Creates an engine with a custom time source
    pub fn with_clock(repo: R, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        Self {
            repo,
            clock: Box::new(clock),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Loads the full task set into a graph
    pub fn load_graph(&self) -> Result<TaskGraph> {
        let tasks = self.repo.load_all()?;
        let graph = TaskGraph::from_tasks(tasks);

        let dangling = graph
            .tasks()
            .filter(|t| t.parent.as_ref().is_some_and(|p| !graph.contains(p)))
            .count();
        if dangling > 0 {
            warn!(count = dangling, "tasks reference a missing parent; treating them as roots");
        }

        debug!(tasks = graph.len(), "loaded task graph");
        Ok(graph)
    }

    fn commit(&self, action: &str, changes: Changeset) -> Result<()> {
        let (saved, deleted) = (changes.save.len(), changes.delete.len());
        self.repo.commit(changes)?;
        info!(action, saved, deleted, "committed changes");
        Ok(())
    }

    /// Loads a single task
    pub fn task(&self, id: &TaskId) -> Result<Task> {
        Ok(self.repo.load(id)?)
    }

    /// Creates a new `todo` task
    pub fn add_task(&self, request: NewTask) -> Result<Task> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidName("Task name"));
        }

        let graph = self.load_graph()?;
        if let Some(parent) = &request.parent {
            if graph.require(parent)?.status.is_done() {
                return Err(GraphError::ParentDone(parent.clone()).into());
            }
        }

        let now = self.now();
        let id = TaskId::generate_unique(name, now, |id| graph.contains(id));

        let mut task = Task::new(id, name, now);
        task.description = request.description.filter(|d| !d.trim().is_empty());
        task.parent = request.parent;

        self.commit("add", Changeset::new().save(task.clone()))?;
        Ok(task)
    }

    /// Loads a task with its derived relations
    pub fn show_task(&self, id: &TaskId) -> Result<TaskDetails> {
        let graph = self.load_graph()?;
        let task = graph.require(id)?;

        Ok(TaskDetails {
            blocked: graph.is_blocked(task),
            unresolved_blockers: graph.unresolved_blockers(task).into_iter().cloned().collect(),
            children: graph.children(id).into_iter().map(|t| t.id.clone()).collect(),
            dependents: graph.dependents(id).into_iter().map(|t| t.id.clone()).collect(),
            task: task.clone(),
        })
    }

    /// Lists tasks matching the filter, oldest first
    pub fn list_tasks(&self, filter: &ListFilter) -> Result<Vec<ListedTask>> {
        let graph = self.load_graph()?;
        Ok(graph
            .sorted()
            .into_iter()
            .filter(|t| filter.matches(&graph, t))
            .map(|t| ListedTask {
                blocked: graph.is_blocked(t),
                task: t.clone(),
            })
            .collect())
    }

    /// Makes `parent` the parent of `child`
    pub fn add_parent_edge(&self, child: &TaskId, parent: &TaskId) -> Result<Task> {
        let graph = self.load_graph()?;
        let updated = transition::set_parent(&graph, child, parent, self.now())?;

        self.commit("parent", Changeset::new().save(updated.clone()))?;
        Ok(updated)
    }

    /// Makes `child` a root; a no-op if it already is one
    pub fn remove_parent_edge(&self, child: &TaskId) -> Result<Task> {
        let graph = self.load_graph()?;
        let before = graph.require(child)?;
        let updated = transition::clear_parent(&graph, child, self.now())?;

        if before.parent.is_some() {
            self.commit("unparent", Changeset::new().save(updated.clone()))?;
        }
        Ok(updated)
    }

    /// Makes `blocked` wait on `blocker`
    pub fn add_block_edge(&self, blocker: &TaskId, blocked: &TaskId) -> Result<Task> {
        let graph = self.load_graph()?;
        let updated = transition::add_blocker(&graph, blocker, blocked, self.now())?;

        self.commit("block", Changeset::new().save(updated.clone()))?;
        Ok(updated)
    }

    /// Removes `blocker` from the `blocked_by` set of `blocked`
    pub fn remove_block_edge(&self, blocker: &TaskId, blocked: &TaskId) -> Result<Task> {
        let graph = self.load_graph()?;
        let updated = transition::remove_blocker(&graph, blocker, blocked, self.now())?;

        self.commit("unblock", Changeset::new().save(updated.clone()))?;
        Ok(updated)
    }

    /// Changes a task's status, releasing its dependents when it becomes `done`
    pub fn change_status(&self, id: &TaskId, status: TaskStatus) -> Result<StatusOutcome> {
        let graph = self.load_graph()?;
        let change = transition::change_status(&graph, id, status, self.now())?;

        let task = change.task.clone();
        let unblocked: Vec<TaskId> = change.released.iter().map(|t| t.id.clone()).collect();

        self.commit("status", Changeset::new().save_all(change.into_tasks()))?;
        if !unblocked.is_empty() {
            debug!(task = %id, released = unblocked.len(), "released dependents");
        }
        Ok(StatusOutcome { task, unblocked })
    }

    /// Parses `status` at the boundary, then changes it
    pub fn change_status_str(&self, id: &TaskId, status: &str) -> Result<StatusOutcome> {
        let status: TaskStatus = status.parse()?;
        self.change_status(id, status)
    }

    /// Recommends what to work on next
    pub fn next_task(&self, options: NextOptions) -> Result<NextTask> {
        let graph = self.load_graph()?;
        Ok(select_next(&graph, options))
    }

    /// Sets the advisory owner of a task
    pub fn claim(&self, id: &TaskId, agent: &str, force: bool) -> Result<Task> {
        let agent = agent.trim();
        if agent.is_empty() {
            return Err(EngineError::InvalidName("Agent name"));
        }

        let mut task = self.task(id)?;
        if let Some(owner) = task.owner.as_deref().filter(|o| !o.is_empty()) {
            if owner != agent && !force {
                return Err(EngineError::AlreadyClaimed {
                    id: id.clone(),
                    owner: owner.to_string(),
                });
            }
        }

        task.owner = Some(agent.to_string());
        task.touch(self.now());
        self.commit("claim", Changeset::new().save(task.clone()))?;
        Ok(task)
    }

    /// Clears the owner of a task
    pub fn unclaim(&self, id: &TaskId) -> Result<Task> {
        let mut task = self.task(id)?;
        if task.is_unowned() {
            return Err(EngineError::NotClaimed(id.clone()));
        }

        task.owner = None;
        task.touch(self.now());
        self.commit("unclaim", Changeset::new().save(task.clone()))?;
        Ok(task)
    }

    /// Appends a note to a task
    pub fn add_note(&self, id: &TaskId, content: &str) -> Result<Task> {
        if content.trim().is_empty() {
            return Err(EngineError::EmptyNote);
        }

        let mut task = self.task(id)?;
        task.add_note(content, self.now());
        self.commit("note", Changeset::new().save(task.clone()))?;
        Ok(task)
    }

    /// Updates the name and/or description of a task
    pub fn edit_task(&self, id: &TaskId, edit: TaskEdit) -> Result<Task> {
        let mut task = self.task(id)?;

        if let Some(name) = edit.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(EngineError::InvalidName("Task name"));
            }
            task.name = name.to_string();
        }
        if let Some(description) = edit.description {
            task.description = Some(description).filter(|d| !d.trim().is_empty());
        }

        task.touch(self.now());
        self.commit("edit", Changeset::new().save(task.clone()))?;
        Ok(task)
    }

    /// Deletes a task, handling its children according to `policy`
    pub fn delete_task(&self, id: &TaskId, policy: ChildPolicy) -> Result<DeleteOutcome> {
        let graph = self.load_graph()?;
        let task = graph.require(id)?;
        let children = graph.children(id);
        let now = self.now();

        let mut outcome = DeleteOutcome {
            deleted: vec![id.clone()],
            moved: Vec::new(),
        };
        let mut updates: HashMap<TaskId, Task> = HashMap::new();

        if !children.is_empty() {
            match policy {
                ChildPolicy::Reject => {
                    return Err(GraphError::HasChildren {
                        id: id.clone(),
                        count: children.len(),
                    }
                    .into());
                }
                ChildPolicy::Orphan | ChildPolicy::Reparent => {
                    let new_parent = match policy {
                        ChildPolicy::Reparent => graph.parent_of(id).map(|p| p.id.clone()),
                        _ => None,
                    };
                    for child in children {
                        let mut child = child.clone();
                        child.parent = new_parent.clone();
                        child.touch(now);
                        outcome.moved.push(child.id.clone());
                        updates.insert(child.id.clone(), child);
                    }
                }
                ChildPolicy::Cascade => {
                    outcome
                        .deleted
                        .extend(graph.descendants(id).into_iter().map(|t| t.id.clone()));
                }
            }
        }

        debug!(task = %task.id, policy = %policy, "deleting task");
        let changes = removal_changes(&graph, &outcome.deleted, updates, now);
        self.commit("delete", changes)?;
        Ok(outcome)
    }

    /// Deletes every done task whose subtree is entirely done
    pub fn prune(&self) -> Result<Vec<TaskId>> {
        let graph = self.load_graph()?;

        let pruned: Vec<TaskId> = graph
            .sorted()
            .into_iter()
            .filter(|t| t.status.is_done() && !graph.has_undone_children(&t.id))
            .map(|t| t.id.clone())
            .collect();

        if pruned.is_empty() {
            return Ok(pruned);
        }

        let changes = removal_changes(&graph, &pruned, HashMap::new(), self.now());
        self.commit("prune", changes)?;
        Ok(pruned)
    }

    /// Builds the visible forest
    ///
    /// Unless `show_all`, done tasks are hidden when they are roots or their
    /// parent is also done. A visible task whose parent is hidden is shown
    /// at the top level.
    pub fn tree(&self, show_all: bool) -> Result<Vec<TreeNode>> {
        let graph = self.load_graph()?;

        let visible: HashSet<&TaskId> = graph
            .tasks()
            .filter(|t| {
                show_all
                    || !t.status.is_done()
                    || graph.parent_of(&t.id).is_some_and(|p| !p.status.is_done())
            })
            .map(|t| &t.id)
            .collect();

        Ok(graph
            .sorted()
            .into_iter()
            .filter(|t| visible.contains(&t.id))
            .filter(|t| {
                graph
                    .parent_of(&t.id)
                    .map_or(true, |p| !visible.contains(&p.id))
            })
            .map(|t| build_node(&graph, t, &visible))
            .collect())
    }

    /// Audits the stored graph
    pub fn check(&self) -> Result<Vec<Violation>> {
        let graph = self.load_graph()?;
        Ok(domain::check(&graph))
    }
}

fn build_node(graph: &TaskGraph, task: &Task, visible: &HashSet<&TaskId>) -> TreeNode {
    TreeNode {
        task: task.clone(),
        children: graph
            .children(&task.id)
            .into_iter()
            .filter(|c| visible.contains(&c.id))
            .map(|c| build_node(graph, c, visible))
            .collect(),
    }
}

/// Deletes `removed` and strips them from every surviving `blocked_by`
fn removal_changes(
    graph: &TaskGraph,
    removed: &[TaskId],
    mut updates: HashMap<TaskId, Task>,
    now: DateTime<Utc>,
) -> Changeset {
    let removed_set: HashSet<&TaskId> = removed.iter().collect();

    for task in graph.tasks() {
        if removed_set.contains(&task.id) || !task.blocked_by.iter().any(|b| removed_set.contains(b)) {
            continue;
        }
        let entry = updates
            .entry(task.id.clone())
            .or_insert_with(|| task.clone());
        for id in removed {
            entry.blocked_by.remove(id);
        }
        entry.touch(now);
    }

    let mut saves: Vec<Task> = updates.into_values().collect();
    saves.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    removed
        .iter()
        .cloned()
        .fold(Changeset::new().save_all(saves), Changeset::delete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use std::cell::Cell;

    fn engine() -> Engine<MemoryStore> {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let tick = Cell::new(0);
        Engine::with_clock(MemoryStore::new(), move || {
            tick.set(tick.get() + 1);
            base + Duration::seconds(tick.get())
        })
    }

    fn add(engine: &Engine<MemoryStore>, name: &str) -> TaskId {
        engine.add_task(NewTask::named(name)).unwrap().id
    }

    fn add_child(engine: &Engine<MemoryStore>, name: &str, parent: &TaskId) -> TaskId {
        engine
            .add_task(NewTask::named(name).with_parent(parent.clone()))
            .unwrap()
            .id
    }

    fn ids(tasks: &[Task]) -> Vec<TaskId> {
        tasks.iter().map(|t| t.id.clone()).collect()
    }

    fn listed_ids(tasks: &[ListedTask]) -> Vec<TaskId> {
        tasks.iter().map(|t| t.task.id.clone()).collect()
    }

    // =========================================================================
    // End-to-end scenarios
    // =========================================================================

    #[test]
    fn scenario_roots_are_candidates_in_creation_order() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add(&engine, "B");

        match engine.next_task(NextOptions::default()).unwrap() {
            NextTask::Candidates { tasks } => assert_eq!(ids(&tasks), vec![a, b]),
            other => panic!("expected candidates, got {other:?}"),
        }
    }

    #[test]
    fn scenario_in_progress_parent_yields_child() {
        let engine = engine();
        let a = add(&engine, "A");
        let a1 = add_child(&engine, "A1", &a);
        engine.change_status(&a, TaskStatus::InProgress).unwrap();

        assert_eq!(
            engine.next_task(NextOptions::default()).unwrap(),
            NextTask::Task {
                task: engine.task(&a1).unwrap()
            }
        );
    }

    #[test]
    fn scenario_deepest_thread_first() {
        let engine = engine();
        let a = add(&engine, "A");
        let a1 = add_child(&engine, "A1", &a);
        let a1a = add_child(&engine, "A1a", &a1);
        add_child(&engine, "A2", &a);
        engine.change_status(&a, TaskStatus::InProgress).unwrap();
        engine.change_status(&a1, TaskStatus::InProgress).unwrap();

        match engine.next_task(NextOptions::default()).unwrap() {
            NextTask::Task { task } => assert_eq!(task.id, a1a),
            other => panic!("expected a task, got {other:?}"),
        }
    }

    #[test]
    fn scenario_done_blocker_releases_dependent() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add(&engine, "B");
        engine.add_block_edge(&a, &b).unwrap();

        let err = engine.change_status(&b, TaskStatus::InProgress).unwrap_err();
        assert_eq!(err.kind(), "blocked");

        let outcome = engine.change_status(&a, TaskStatus::Done).unwrap();
        assert_eq!(outcome.unblocked, vec![b.clone()]);
        assert!(engine.task(&b).unwrap().blocked_by.is_empty());

        engine.change_status(&b, TaskStatus::InProgress).unwrap();
    }

    #[test]
    fn scenario_parent_cycle_rejected() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add_child(&engine, "B", &a);
        let c = add_child(&engine, "C", &b);

        let err = engine.add_parent_edge(&a, &c).unwrap_err();
        assert!(err.is_cycle());
        assert!(engine.task(&a).unwrap().parent.is_none());
    }

    #[test]
    fn scenario_parent_waits_for_children() {
        let engine = engine();
        let p = add(&engine, "P");
        let k = add_child(&engine, "K", &p);

        let err = engine.change_status(&p, TaskStatus::Done).unwrap_err();
        assert_eq!(err.kind(), "incomplete_children");

        engine.change_status(&k, TaskStatus::Done).unwrap();
        engine.change_status(&p, TaskStatus::Done).unwrap();
    }

    // =========================================================================
    // Edges
    // =========================================================================

    #[test]
    fn unparent_is_idempotent() {
        let engine = engine();
        let a = add(&engine, "A");
        let before = engine.task(&a).unwrap();

        let after = engine.remove_parent_edge(&a).unwrap();
        assert_eq!(after, before);
        assert_eq!(engine.task(&a).unwrap(), before);
    }

    #[test]
    fn unparent_clears_parent() {
        let engine = engine();
        let p = add(&engine, "P");
        let c = add_child(&engine, "C", &p);

        engine.remove_parent_edge(&c).unwrap();
        assert!(engine.task(&c).unwrap().parent.is_none());
    }

    #[test]
    fn block_cycle_rejected_without_writing() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add(&engine, "B");
        engine.add_block_edge(&a, &b).unwrap();

        let err = engine.add_block_edge(&b, &a).unwrap_err();
        assert!(err.is_cycle());
        assert!(engine.task(&a).unwrap().blocked_by.is_empty());
    }

    #[test]
    fn unblock_requires_edge() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add(&engine, "B");

        assert_eq!(engine.remove_block_edge(&a, &b).unwrap_err().kind(), "not_blocked");

        engine.add_block_edge(&a, &b).unwrap();
        engine.remove_block_edge(&a, &b).unwrap();
        assert!(engine.task(&b).unwrap().blocked_by.is_empty());
    }

    #[test]
    fn missing_ids_are_not_found() {
        let engine = engine();
        let a = add(&engine, "A");
        let ghost: TaskId = "ghost".parse().unwrap();

        assert!(engine.add_parent_edge(&a, &ghost).unwrap_err().is_not_found());
        assert!(engine.add_block_edge(&ghost, &a).unwrap_err().is_not_found());
        assert!(engine.change_status(&ghost, TaskStatus::Done).unwrap_err().is_not_found());
        assert!(engine.remove_parent_edge(&ghost).unwrap_err().is_not_found());
        assert!(engine.claim(&ghost, "agent", false).unwrap_err().is_not_found());
    }

    #[test]
    fn invalid_status_string_is_rejected() {
        let engine = engine();
        let a = add(&engine, "A");

        let err = engine.change_status_str(&a, "blocked").unwrap_err();
        assert_eq!(err.kind(), "invalid_status");
        assert_eq!(engine.task(&a).unwrap().status, TaskStatus::Todo);
    }

    // =========================================================================
    // Add / claim / note / edit
    // =========================================================================

    #[test]
    fn add_validates_name_and_parent() {
        let engine = engine();
        assert_eq!(
            engine.add_task(NewTask::named("  ")).unwrap_err().kind(),
            "invalid_name"
        );

        let p = add(&engine, "P");
        engine.change_status(&p, TaskStatus::Done).unwrap();
        assert_eq!(
            engine
                .add_task(NewTask::named("C").with_parent(p))
                .unwrap_err()
                .kind(),
            "parent_done"
        );
    }

    #[test]
    fn add_stores_description() {
        let engine = engine();
        let task = engine
            .add_task(NewTask::named("A").with_description("details"))
            .unwrap();

        assert_eq!(task.description.as_deref(), Some("details"));
        assert_eq!(engine.task(&task.id).unwrap(), task);
    }

    #[test]
    fn claim_respects_existing_owner() {
        let engine = engine();
        let a = add(&engine, "A");

        engine.claim(&a, "alice", false).unwrap();
        engine.claim(&a, "alice", false).unwrap();
        assert_eq!(engine.claim(&a, "bob", false).unwrap_err().kind(), "already_claimed");

        let task = engine.claim(&a, "bob", true).unwrap();
        assert_eq!(task.owner.as_deref(), Some("bob"));
        assert_eq!(engine.claim(&a, " ", false).unwrap_err().kind(), "invalid_name");
    }

    #[test]
    fn unclaim_requires_owner() {
        let engine = engine();
        let a = add(&engine, "A");

        assert_eq!(engine.unclaim(&a).unwrap_err().kind(), "not_claimed");
        engine.claim(&a, "alice", false).unwrap();
        assert!(engine.unclaim(&a).unwrap().owner.is_none());
    }

    #[test]
    fn notes_append_in_order() {
        let engine = engine();
        let a = add(&engine, "A");

        assert!(matches!(engine.add_note(&a, ""), Err(EngineError::EmptyNote)));
        engine.add_note(&a, "first").unwrap();
        let task = engine.add_note(&a, "second").unwrap();

        let contents: Vec<_> = task.notes.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert!(task.notes[0].timestamp < task.notes[1].timestamp);
    }

    #[test]
    fn edit_updates_display_fields() {
        let engine = engine();
        let a = engine
            .add_task(NewTask::named("A").with_description("old"))
            .unwrap();

        let edited = engine
            .edit_task(
                &a.id,
                TaskEdit {
                    name: Some("Renamed".to_string()),
                    description: Some(String::new()),
                },
            )
            .unwrap();

        assert_eq!(edited.name, "Renamed");
        assert_eq!(edited.description, None);
        assert!(edited.updated > a.updated);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[test]
    fn list_filters_combine() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add(&engine, "B");
        let c = add(&engine, "C");
        engine.add_block_edge(&a, &b).unwrap();
        engine.claim(&c, "alice", false).unwrap();

        let blocked = engine
            .list_tasks(&ListFilter {
                blocked: Some(true),
                ..ListFilter::default()
            })
            .unwrap();
        assert_eq!(listed_ids(&blocked), vec![b.clone()]);
        assert!(blocked.iter().all(|t| t.blocked));

        let unclaimed_ready = engine
            .list_tasks(&ListFilter {
                unclaimed: true,
                blocked: Some(false),
                ..ListFilter::default()
            })
            .unwrap();
        assert_eq!(listed_ids(&unclaimed_ready), vec![a.clone()]);
        assert!(!unclaimed_ready[0].blocked);

        let owned = engine
            .list_tasks(&ListFilter {
                owner: Some("alice".to_string()),
                ..ListFilter::default()
            })
            .unwrap();
        assert_eq!(listed_ids(&owned), vec![c]);
    }

    #[test]
    fn show_includes_derived_relations() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add_child(&engine, "B", &a);
        engine.add_block_edge(&b, &a).unwrap();

        let details = engine.show_task(&a).unwrap();
        assert!(details.blocked);
        assert_eq!(details.unresolved_blockers, vec![b.clone()]);
        assert_eq!(details.children, vec![b.clone()]);

        assert_eq!(engine.show_task(&b).unwrap().dependents, vec![a]);
    }

    #[test]
    fn next_counts_blocked_when_nothing_ready() {
        let engine = engine();
        let a = add(&engine, "A");
        for name in ["B", "C", "D"] {
            let id = add(&engine, name);
            engine.add_block_edge(&a, &id).unwrap();
        }
        engine.change_status(&a, TaskStatus::InProgress).unwrap();

        assert_eq!(
            engine.next_task(NextOptions::default()).unwrap(),
            NextTask::Empty { blocked_count: 3 }
        );
    }

    #[test]
    fn tree_hides_finished_branches() {
        let engine = engine();
        let p = add(&engine, "P");
        let k = add_child(&engine, "K", &p);
        let open = add(&engine, "Open");
        let kk = add_child(&engine, "KK", &k);
        engine.change_status(&kk, TaskStatus::Done).unwrap();

        let tree = engine.tree(false).unwrap();
        let roots: Vec<_> = tree.iter().map(|n| n.task.id.clone()).collect();
        assert_eq!(roots, vec![p.clone(), open.clone()]);
        // kk is done but its parent is not, so it stays visible
        assert_eq!(tree[0].children[0].children[0].task.id, kk);

        engine.change_status(&k, TaskStatus::Done).unwrap();
        engine.change_status(&p, TaskStatus::Done).unwrap();

        let tree = engine.tree(false).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].task.id, open);

        assert_eq!(engine.tree(true).unwrap().len(), 2);
    }

    #[test]
    fn check_is_clean_after_engine_writes() {
        let engine = engine();
        let a = add(&engine, "A");
        let b = add_child(&engine, "B", &a);
        let c = add(&engine, "C");
        engine.add_block_edge(&c, &b).unwrap();
        engine.change_status(&c, TaskStatus::Done).unwrap();

        assert!(engine.check().unwrap().is_empty());
    }

    // =========================================================================
    // Delete / prune
    // =========================================================================

    #[test]
    fn delete_rejects_children_by_default() {
        let engine = engine();
        let p = add(&engine, "P");
        add_child(&engine, "C", &p);

        let err = engine.delete_task(&p, ChildPolicy::Reject).unwrap_err();
        assert_eq!(err.kind(), "has_children");
        assert_eq!(engine.repository().len(), 2);
    }

    #[test]
    fn delete_reparents_children() {
        let engine = engine();
        let g = add(&engine, "G");
        let p = add_child(&engine, "P", &g);
        let c = add_child(&engine, "C", &p);

        let outcome = engine.delete_task(&p, ChildPolicy::Reparent).unwrap();
        assert_eq!(outcome.moved, vec![c.clone()]);
        assert_eq!(engine.task(&c).unwrap().parent, Some(g));
    }

    #[test]
    fn delete_orphans_children() {
        let engine = engine();
        let p = add(&engine, "P");
        let c = add_child(&engine, "C", &p);

        engine.delete_task(&p, ChildPolicy::Orphan).unwrap();
        assert!(engine.task(&c).unwrap().parent.is_none());
    }

    #[test]
    fn delete_cascades_and_prunes_blockers() {
        let engine = engine();
        let p = add(&engine, "P");
        let c = add_child(&engine, "C", &p);
        let other = add(&engine, "Other");
        engine.add_block_edge(&c, &other).unwrap();

        let outcome = engine.delete_task(&p, ChildPolicy::Cascade).unwrap();
        assert_eq!(outcome.deleted, vec![p, c]);
        assert_eq!(engine.repository().len(), 1);
        assert!(engine.task(&other).unwrap().blocked_by.is_empty());
    }

    #[test]
    fn prune_removes_finished_subtrees_only() {
        let engine = engine();
        let p = add(&engine, "P");
        let k = add_child(&engine, "K", &p);
        let open = add(&engine, "Open");
        let half = add(&engine, "Half");
        let half_child = add_child(&engine, "HalfChild", &half);
        engine.change_status(&k, TaskStatus::Done).unwrap();
        engine.change_status(&p, TaskStatus::Done).unwrap();
        engine.change_status(&half_child, TaskStatus::Done).unwrap();

        let pruned = engine.prune().unwrap();
        assert_eq!(pruned, vec![p, k, half_child]);

        let remaining = listed_ids(&engine.list_tasks(&ListFilter::default()).unwrap());
        assert_eq!(remaining, vec![open, half]);
        assert!(engine.prune().unwrap().is_empty());
    }

    // =========================================================================
    // Atomicity
    // =========================================================================

    struct FailingCommit(MemoryStore);

    impl TaskRepository for FailingCommit {
        fn load_all(&self) -> std::result::Result<Vec<Task>, RepositoryError> {
            self.0.load_all()
        }

        fn save(&self, task: &Task) -> std::result::Result<(), RepositoryError> {
            self.0.save(task)
        }

        fn delete(&self, id: &TaskId) -> std::result::Result<(), RepositoryError> {
            self.0.delete(id)
        }

        fn commit(&self, _changes: Changeset) -> std::result::Result<(), RepositoryError> {
            Err(RepositoryError::Corrupt {
                location: "test".to_string(),
                message: "disk full".to_string(),
            })
        }
    }

    #[test]
    fn failed_commit_leaves_store_untouched() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut a = Task::new("a".parse().unwrap(), "A", base);
        let mut b = Task::new("b".parse().unwrap(), "B", base + Duration::seconds(1));
        b.blocked_by.insert(a.id.clone());
        a.status = TaskStatus::InProgress;

        let store = FailingCommit(MemoryStore::with_tasks(vec![a.clone(), b.clone()]));
        let engine = Engine::new(store);

        let err = engine.change_status(&a.id, TaskStatus::Done).unwrap_err();
        assert_eq!(err.kind(), "repository");
        assert_eq!(engine.task(&a.id).unwrap(), a);
        assert_eq!(engine.task(&b.id).unwrap(), b);
    }
}
