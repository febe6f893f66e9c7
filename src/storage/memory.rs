//! In-memory repository for tests and embedding

use std::cell::RefCell;
use std::collections::HashMap;

use super::repository::{Changeset, RepositoryError, TaskRepository};
use crate::domain::{Task, TaskId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RefCell<HashMap<TaskId, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing tasks
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl TaskRepository for MemoryStore {
    fn load_all(&self) -> Result<Vec<Task>, RepositoryError> {
        Ok(self.tasks.borrow().values().cloned().collect())
    }

    fn load(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        self.tasks
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.tasks.borrow_mut().insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        self.tasks
            .borrow_mut()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    fn commit(&self, changes: Changeset) -> Result<(), RepositoryError> {
        changes.apply_to(&mut self.tasks.borrow_mut())
    }
}
