//! JSONL storage for tasks
//!
//! Tasks are stored in `.workq/tasks.jsonl` with one JSON object per line.
//! Uses file locking for concurrent access safety.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::repository::{Changeset, RepositoryError, TaskRepository};
use super::PROJECT_DIR;
use crate::domain::{sort_by_created, Task, TaskId};

/// Store for task data in JSONL format
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Creates a new task store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(PROJECT_DIR).join("tasks.jsonl"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all tasks from the store
    ///
    /// A later line for the same ID replaces an earlier one.
    pub fn read_all(&self) -> Result<HashMap<TaskId, Task>, RepositoryError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let file = File::open(&self.path).map_err(RepositoryError::io(&self.path))?;

        file.lock_shared().map_err(RepositoryError::io(&self.path))?;

        let reader = BufReader::new(&file);
        let mut tasks = HashMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(RepositoryError::io(&self.path))?;

            if line.trim().is_empty() {
                continue;
            }

            let task: Task = serde_json::from_str(&line).map_err(|e| RepositoryError::Corrupt {
                location: format!("{}:{}", self.path.display(), line_num + 1),
                message: e.to_string(),
            })?;

            tasks.insert(task.id.clone(), task);
        }

        // Lock is released when file is dropped
        Ok(tasks)
    }

    /// Writes all tasks to the store (full rewrite)
    pub fn write_all(&self, tasks: &HashMap<TaskId, Task>) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(RepositoryError::io(parent))?;
        }

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(RepositoryError::io(&temp_path))?;

            file.lock_exclusive().map_err(RepositoryError::io(&temp_path))?;

            let mut writer = BufWriter::new(&file);

            // Creation order keeps diffs small as tasks are added
            let mut sorted: Vec<&Task> = tasks.values().collect();
            sort_by_created(&mut sorted);

            for task in sorted {
                let line = serde_json::to_string(task).map_err(|e| RepositoryError::Encode {
                    id: task.id.clone(),
                    message: e.to_string(),
                })?;
                writeln!(writer, "{}", line).map_err(RepositoryError::io(&temp_path))?;
            }

            writer.flush().map_err(RepositoryError::io(&temp_path))?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).map_err(RepositoryError::io(&self.path))?;

        Ok(())
    }

    /// Rewrites the file, dropping superseded duplicate lines
    pub fn compact(&self) -> Result<usize, RepositoryError> {
        let tasks = self.read_all()?;
        let count = tasks.len();
        self.write_all(&tasks)?;
        Ok(count)
    }
}

impl TaskRepository for JsonlStore {
    fn load_all(&self) -> Result<Vec<Task>, RepositoryError> {
        Ok(self.read_all()?.into_values().collect())
    }

    fn load(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        self.read_all()?
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound(id.clone()))
    }

    fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().save(task.clone()))
    }

    fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().delete(id.clone()))
    }

    fn commit(&self, changes: Changeset) -> Result<(), RepositoryError> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut tasks = self.read_all()?;
        changes.apply_to(&mut tasks)?;
        self.write_all(&tasks)
    }
}
