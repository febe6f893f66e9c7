//! Task graph model
//!
//! [`TaskGraph`] is the in-memory view of one loaded task set: a by-id map
//! plus a children index over the parent relation. [`DependencyGraph`] is the
//! petgraph projection of the `blocked_by` relation used for reachability and
//! cycle queries.
//!
//! A `parent` that points at an ID missing from the set (a deleted task) is
//! treated as absent: the task counts as a root for every hierarchy query.

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::id::TaskId;
use super::task::Task;

/// Rejections raised by graph and status-transition checks
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Cannot set task {0} as its own parent")]
    SelfParent(TaskId),

    #[error("A task cannot block itself: {0}")]
    SelfBlock(TaskId),

    #[error("Setting {parent} as parent of {child} would create a cycle")]
    ParentCycle { child: TaskId, parent: TaskId },

    #[error("Making {blocked} depend on {blocker} would create a cycle")]
    BlockCycle { blocker: TaskId, blocked: TaskId },

    #[error("Cannot use done task {0} as a parent")]
    ParentDone(TaskId),

    #[error("Cannot block on completed task {0}")]
    BlockerDone(TaskId),

    #[error("Task {blocked} is already blocked by {blocker}")]
    AlreadyBlocked { blocker: TaskId, blocked: TaskId },

    #[error("Task {blocked} is not blocked by {blocker}")]
    NotBlocked { blocker: TaskId, blocked: TaskId },

    #[error("Cannot add blocker {blocker} to in-progress task {blocked}; move it back to todo first")]
    InProgressBlock { blocker: TaskId, blocked: TaskId },

    #[error("Cannot start task {id}: blocked by {}", join_ids(.blockers))]
    Blocked { id: TaskId, blockers: Vec<TaskId> },

    #[error("Cannot mark task {id} as done: has undone children ({})", join_ids(.undone))]
    IncompleteChildren { id: TaskId, undone: Vec<TaskId> },

    #[error("Task {id} has {count} child task(s); choose how to handle them")]
    HasChildren { id: TaskId, count: usize },
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl GraphError {
    /// Returns a stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::TaskNotFound(_) => "not_found",
            GraphError::SelfParent(_) => "self_parent",
            GraphError::SelfBlock(_) => "self_block",
            GraphError::ParentCycle { .. } | GraphError::BlockCycle { .. } => "cycle",
            GraphError::ParentDone(_) => "parent_done",
            GraphError::BlockerDone(_) => "blocker_done",
            GraphError::AlreadyBlocked { .. } => "already_blocked",
            GraphError::NotBlocked { .. } => "not_blocked",
            GraphError::InProgressBlock { .. } => "in_progress_block",
            GraphError::Blocked { .. } => "blocked",
            GraphError::IncompleteChildren { .. } => "incomplete_children",
            GraphError::HasChildren { .. } => "has_children",
        }
    }

    /// Returns true for either kind of cycle rejection
    pub fn is_cycle(&self) -> bool {
        matches!(
            self,
            GraphError::ParentCycle { .. } | GraphError::BlockCycle { .. }
        )
    }
}

/// Sorts task references by creation time, then ID
pub fn sort_by_created(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| a.order_key().cmp(&b.order_key()));
}

/// Read-only view over a loaded task set
#[derive(Debug, Default, Clone)]
pub struct TaskGraph {
    tasks: HashMap<TaskId, Task>,

    /// Direct children per parent, ordered by creation
    children: HashMap<TaskId, Vec<TaskId>>,

    /// Tasks with no (existing) parent, ordered by creation
    roots: Vec<TaskId>,
}

impl TaskGraph {
    /// Builds the graph and its indexes from a collection of tasks
    pub fn from_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks: HashMap<TaskId, Task> = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();

        let mut sorted: Vec<&Task> = tasks.values().collect();
        sort_by_created(&mut sorted);

        let mut children: HashMap<TaskId, Vec<TaskId>> = HashMap::new();
        let mut roots = Vec::new();

        for task in sorted {
            match task.parent.as_ref().filter(|p| tasks.contains_key(*p)) {
                Some(parent) => children
                    .entry(parent.clone())
                    .or_default()
                    .push(task.id.clone()),
                None => roots.push(task.id.clone()),
            }
        }

        Self {
            tasks,
            children,
            roots,
        }
    }

    /// Looks up a task
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Looks up a task, failing with [`GraphError::TaskNotFound`]
    pub fn require(&self, id: &TaskId) -> Result<&Task, GraphError> {
        self.tasks
            .get(id)
            .ok_or_else(|| GraphError::TaskNotFound(id.clone()))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterates over all tasks in no particular order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// All tasks ordered by creation time, then ID
    pub fn sorted(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        sort_by_created(&mut tasks);
        tasks
    }

    /// Consumes the graph, returning the owned tasks
    pub fn into_tasks(self) -> HashMap<TaskId, Task> {
        self.tasks
    }

    /// Parent of a task, ignoring references to missing tasks
    pub fn parent_of(&self, id: &TaskId) -> Option<&Task> {
        self.tasks
            .get(id)
            .and_then(|t| t.parent.as_ref())
            .and_then(|p| self.tasks.get(p))
    }

    /// Direct children, ordered by creation
    pub fn children(&self, id: &TaskId) -> Vec<&Task> {
        self.resolve(self.children.get(id).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Tasks sharing this task's parent (roots share the "no parent" bucket)
    pub fn siblings(&self, id: &TaskId) -> Vec<&Task> {
        let bucket = match self.parent_of(id) {
            Some(parent) => self.children.get(&parent.id).map(Vec::as_slice).unwrap_or(&[]),
            None => self.roots.as_slice(),
        };

        self.resolve(bucket)
            .into_iter()
            .filter(|t| &t.id != id)
            .collect()
    }

    /// Tasks without a parent, ordered by creation
    pub fn roots(&self) -> Vec<&Task> {
        self.resolve(&self.roots)
    }

    /// All descendants over the parent relation, depth-first
    pub fn descendants(&self, id: &TaskId) -> Vec<&Task> {
        let mut found = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<&TaskId> = self
            .children
            .get(id)
            .map(|c| c.iter().rev().collect())
            .unwrap_or_default();

        visited.insert(id);
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(task) = self.tasks.get(current) {
                found.push(task);
            }
            if let Some(children) = self.children.get(current) {
                stack.extend(children.iter().rev());
            }
        }

        found
    }

    /// Descendants whose status is not `done`
    pub fn undone_descendants(&self, id: &TaskId) -> Vec<&Task> {
        self.descendants(id)
            .into_iter()
            .filter(|t| !t.status.is_done())
            .collect()
    }

    /// Returns true if any descendant is not `done`
    pub fn has_undone_children(&self, id: &TaskId) -> bool {
        self.descendants(id).iter().any(|t| !t.status.is_done())
    }

    /// Blockers of a task that resolve to a task not yet `done`
    ///
    /// IDs that no longer resolve do not block.
    pub fn unresolved_blockers<'a>(&self, task: &'a Task) -> Vec<&'a TaskId> {
        task.blocked_by
            .iter()
            .filter(|b| self.tasks.get(*b).is_some_and(|t| !t.status.is_done()))
            .collect()
    }

    /// Returns true if the task waits on at least one unfinished task
    pub fn is_blocked(&self, task: &Task) -> bool {
        !self.unresolved_blockers(task).is_empty()
    }

    /// Tasks that list `id` in their `blocked_by`
    pub fn dependents(&self, id: &TaskId) -> Vec<&Task> {
        let mut found: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.blocked_by.contains(id))
            .collect();
        sort_by_created(&mut found);
        found
    }

    fn resolve(&self, ids: &[TaskId]) -> Vec<&Task> {
        ids.iter().filter_map(|id| self.tasks.get(id)).collect()
    }
}

/// Directed graph of blocking dependencies
///
/// Edges point from a task to each of its blockers ("depends on"), so a
/// search starting at a task walks its transitive blockers.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TaskId, ()>,
    node_map: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the dependency graph from a task graph
    ///
    /// Blockers that do not resolve to an existing task are left out.
    pub fn from_graph(tasks: &TaskGraph) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for task in tasks.sorted() {
            let idx = graph.add_node(task.id.clone());
            node_map.insert(task.id.clone(), idx);
        }

        for task in tasks.tasks() {
            let from = node_map[&task.id];
            for blocker in &task.blocked_by {
                if let Some(&to) = node_map.get(blocker) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph, node_map }
    }

    /// Returns true if `to` is reachable from `from` following blocker edges
    pub fn reaches(&self, from: &TaskId, to: &TaskId) -> bool {
        let (Some(&start), Some(&target)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return false;
        };

        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(node) = bfs.next(&self.graph) {
            if node == target {
                return true;
            }
        }
        false
    }

    /// Returns true if the blocked-by relation contains a cycle
    pub fn is_cyclic(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Every strongly connected set of tasks that forms a cycle
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .map(|component| {
                let mut ids: Vec<TaskId> = component
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }
}
