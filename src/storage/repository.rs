//! Repository contract between the engine and persistence

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{Task, TaskId};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt task data in {location}: {message}")]
    Corrupt { location: String, message: String },

    #[error("Failed to encode task {id}: {message}")]
    Encode { id: TaskId, message: String },
}

impl RepositoryError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| RepositoryError::Io { path, source }
    }
}

/// A batch of writes applied together
///
/// File-backed repositories apply a changeset with a single rewrite, so a
/// multi-task mutation either lands completely or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    pub save: Vec<Task>,
    pub delete: Vec<TaskId>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(mut self, task: Task) -> Self {
        self.save.push(task);
        self
    }

    pub fn save_all(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.save.extend(tasks);
        self
    }

    pub fn delete(mut self, id: TaskId) -> Self {
        self.delete.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.save.is_empty() && self.delete.is_empty()
    }

    /// Applies the changes to an in-memory map, validating deletes first
    pub fn apply_to(self, tasks: &mut HashMap<TaskId, Task>) -> Result<(), RepositoryError> {
        if let Some(missing) = self.delete.iter().find(|id| !tasks.contains_key(*id)) {
            return Err(RepositoryError::NotFound(missing.clone()));
        }

        for id in &self.delete {
            tasks.remove(id);
        }
        for task in self.save {
            tasks.insert(task.id.clone(), task);
        }
        Ok(())
    }
}

/// Persistence consumed by the engine
pub trait TaskRepository {
    /// Loads every task
    fn load_all(&self) -> Result<Vec<Task>, RepositoryError>;

    /// Loads one task, failing with [`RepositoryError::NotFound`]
    fn load(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        self.load_all()?
            .into_iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    /// Inserts or replaces a task by ID
    fn save(&self, task: &Task) -> Result<(), RepositoryError>;

    /// Removes a task, failing with [`RepositoryError::NotFound`]
    fn delete(&self, id: &TaskId) -> Result<(), RepositoryError>;

    /// Applies a batch of writes
    ///
    /// The default applies each change in turn; stores that can do better
    /// override it to write everything at once.
    fn commit(&self, changes: Changeset) -> Result<(), RepositoryError> {
        for task in &changes.save {
            self.save(task)?;
        }
        for id in &changes.delete {
            self.delete(id)?;
        }
        Ok(())
    }
}

impl<R: TaskRepository + ?Sized> TaskRepository for Box<R> {
    fn load_all(&self) -> Result<Vec<Task>, RepositoryError> {
        (**self).load_all()
    }

    fn load(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        (**self).load(id)
    }

    fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        (**self).save(task)
    }

    fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        (**self).delete(id)
    }

    fn commit(&self, changes: Changeset) -> Result<(), RepositoryError> {
        (**self).commit(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(name: &str) -> Task {
        Task::new(name.parse().unwrap(), name, Utc::now())
    }

    #[test]
    fn apply_saves_and_deletes() {
        let mut tasks = HashMap::new();
        let a = task("a");
        tasks.insert(a.id.clone(), a.clone());

        Changeset::new()
            .save(task("b"))
            .delete(a.id.clone())
            .apply_to(&mut tasks)
            .unwrap();

        assert_eq!(tasks.len(), 1);
        assert!(tasks.contains_key(&"b".parse::<TaskId>().unwrap()));
    }

    #[test]
    fn apply_rejects_missing_delete_without_changes() {
        let mut tasks = HashMap::new();
        let err = Changeset::new()
            .save(task("b"))
            .delete("gone".parse().unwrap())
            .apply_to(&mut tasks)
            .unwrap_err();

        assert!(matches!(err, RepositoryError::NotFound(_)));
        assert!(tasks.is_empty());
    }
}
