//! Markdown storage for tasks
//!
//! Each task lives in `.workq/tasks/<id>.md`: YAML frontmatter for the
//! structured fields and the description as the markdown body.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::repository::{Changeset, RepositoryError, TaskRepository};
use super::PROJECT_DIR;
use crate::domain::{BlockedBy, Note, Task, TaskId, TaskStatus};

/// Everything but the description, which becomes the body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskFrontmatter {
    id: TaskId,
    name: String,
    status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<TaskId>,
    #[serde(default, skip_serializing_if = "BlockedBy::is_empty")]
    blocked_by: BlockedBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    notes: Vec<Note>,
}

impl From<&Task> for TaskFrontmatter {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            status: task.status,
            parent: task.parent.clone(),
            blocked_by: task.blocked_by.clone(),
            owner: task.owner.clone(),
            created: task.created,
            updated: task.updated,
            notes: task.notes.clone(),
        }
    }
}

impl TaskFrontmatter {
    fn into_task(self, body: &str) -> Task {
        Task {
            id: self.id,
            name: self.name,
            description: (!body.is_empty()).then(|| body.to_string()),
            notes: self.notes,
            parent: self.parent,
            status: self.status,
            blocked_by: self.blocked_by,
            owner: self.owner,
            created: self.created,
            updated: self.updated,
        }
    }
}

/// Store for task data as markdown files
pub struct MarkdownStore {
    dir: PathBuf,
}

impl MarkdownStore {
    /// Creates a new store over the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(PROJECT_DIR).join("tasks"))
    }

    /// Returns the directory containing task files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn task_path(&self, id: &TaskId) -> PathBuf {
        self.dir.join(format!("{}.md", id))
    }

    fn read_from_file(&self, path: &Path) -> Result<Task, RepositoryError> {
        let content = fs::read_to_string(path).map_err(RepositoryError::io(path))?;

        parse_markdown(&content).map_err(|message| RepositoryError::Corrupt {
            location: path.display().to_string(),
            message,
        })
    }

    /// Reads every task file in the directory
    pub fn read_all(&self) -> Result<HashMap<TaskId, Task>, RepositoryError> {
        let mut tasks = HashMap::new();

        if !self.dir.exists() {
            return Ok(tasks);
        }

        for entry in fs::read_dir(&self.dir).map_err(RepositoryError::io(&self.dir))? {
            let path = entry.map_err(RepositoryError::io(&self.dir))?.path();

            if path.extension().is_some_and(|e| e == "md") {
                let task = self.read_from_file(&path)?;
                tasks.insert(task.id.clone(), task);
            }
        }

        Ok(tasks)
    }
}

/// Parses a task file: `---`, YAML, `---`, then the description body
fn parse_markdown(content: &str) -> Result<Task, String> {
    let content = content.trim_start();

    let rest = content
        .strip_prefix("---")
        .ok_or("Missing frontmatter (must start with ---)")?;

    let end_pos = rest
        .find("\n---")
        .ok_or("Missing frontmatter end delimiter (---)")?;

    let yaml = &rest[..end_pos];
    let after = &rest[end_pos + 4..];
    let after = after.strip_prefix('\n').unwrap_or(after);
    let body = body_text(after);

    let fm: TaskFrontmatter =
        serde_yaml::from_str(yaml).map_err(|e| format!("Failed to parse frontmatter: {e}"))?;

    Ok(fm.into_task(body))
}

/// Undoes the blank separator line and trailing newline added on render
fn body_text(section: &str) -> &str {
    let body = section.strip_prefix('\n').unwrap_or(section);
    body.strip_suffix('\n').unwrap_or(body)
}

fn render_markdown(task: &Task) -> Result<String, RepositoryError> {
    let yaml = serde_yaml::to_string(&TaskFrontmatter::from(task)).map_err(|e| {
        RepositoryError::Encode {
            id: task.id.clone(),
            message: e.to_string(),
        }
    })?;

    let mut content = String::new();
    content.push_str("---\n");
    content.push_str(&yaml);
    content.push_str("---\n");

    if let Some(description) = &task.description {
        content.push('\n');
        content.push_str(description);
        content.push('\n');
    }

    Ok(content)
}

impl TaskRepository for MarkdownStore {
    fn load_all(&self) -> Result<Vec<Task>, RepositoryError> {
        Ok(self.read_all()?.into_values().collect())
    }

    fn load(&self, id: &TaskId) -> Result<Task, RepositoryError> {
        let path = self.task_path(id);
        if !path.exists() {
            return Err(RepositoryError::NotFound(id.clone()));
        }
        self.read_from_file(&path)
    }

    fn save(&self, task: &Task) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().save(task.clone()))
    }

    fn delete(&self, id: &TaskId) -> Result<(), RepositoryError> {
        self.commit(Changeset::new().delete(id.clone()))
    }

    /// Stages every file before touching any real one
    ///
    /// Rendering and temp-file writes happen first; only when all of them
    /// succeed are the temp files renamed into place and deletions applied.
    fn commit(&self, changes: Changeset) -> Result<(), RepositoryError> {
        if let Some(missing) = changes.delete.iter().find(|id| !self.task_path(id).exists()) {
            return Err(RepositoryError::NotFound(missing.clone()));
        }

        fs::create_dir_all(&self.dir).map_err(RepositoryError::io(&self.dir))?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(changes.save.len());
        for task in &changes.save {
            let path = self.task_path(&task.id);
            let temp_path = path.with_extension("md.tmp");

            let written = render_markdown(task)
                .and_then(|content| fs::write(&temp_path, content).map_err(RepositoryError::io(&temp_path)));

            if let Err(e) = written {
                for (temp, _) in &staged {
                    let _ = fs::remove_file(temp);
                }
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
            staged.push((temp_path, path));
        }

        for (temp_path, path) in staged {
            fs::rename(&temp_path, &path).map_err(RepositoryError::io(&path))?;
        }

        for id in &changes.delete {
            let path = self.task_path(id);
            fs::remove_file(&path).map_err(RepositoryError::io(&path))?;
        }

        Ok(())
    }
}
