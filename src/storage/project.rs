//! Project management
//!
//! Handles project initialization and provides access to the task store.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config::{find_project_root, ConfigError, ProjectConfig, StorageBackend};
use super::{JsonlStore, MarkdownStore, TaskRepository, PROJECT_DIR};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a workq project. Run 'workq init' first.")]
    NotInProject,

    #[error("Failed to create {}: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

const GITIGNORE: &str = "# Temp files from interrupted writes\n*.tmp\ntasks/*.tmp\n";

/// A workq project: a directory containing `.workq/`
#[derive(Debug)]
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject);
        }

        let config = ProjectConfig::load(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self, ProjectError> {
        let root = find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// Existing files are left alone, so running it twice is harmless.
    /// `storage` only takes effect when no config file exists yet.
    pub fn init(root: impl Into<PathBuf>, storage: StorageBackend) -> Result<Self, ProjectError> {
        let root = root.into();
        let project_dir = root.join(PROJECT_DIR);

        create_dir(&project_dir)?;

        if !ProjectConfig::path(&root).exists() {
            let config = ProjectConfig {
                storage,
                ..ProjectConfig::default()
            };
            config.save(&root)?;
        }

        let gitignore_path = project_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).map_err(|source| ProjectError::CreateFailed {
                path: gitignore_path,
                source,
            })?;
        }

        let project = Self::open(root)?;
        if project.config.storage == StorageBackend::Markdown {
            create_dir(&project.tasks_dir())?;
        }

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .workq directory path
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Directory used by the markdown backend
    pub fn tasks_dir(&self) -> PathBuf {
        self.project_dir().join("tasks")
    }

    /// Returns the project configuration
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn storage(&self) -> StorageBackend {
        self.config.storage
    }

    /// Returns the JSONL store, regardless of the configured backend
    pub fn jsonl_store(&self) -> JsonlStore {
        JsonlStore::for_project(&self.root)
    }

    /// Returns the repository for the configured backend
    pub fn repository(&self) -> Box<dyn TaskRepository> {
        match self.storage() {
            StorageBackend::Jsonl => Box::new(self.jsonl_store()),
            StorageBackend::Markdown => Box::new(MarkdownStore::for_project(&self.root)),
        }
    }
}

fn create_dir(path: &Path) -> Result<(), ProjectError> {
    fs::create_dir_all(path).map_err(|source| ProjectError::CreateFailed {
        path: path.to_path_buf(),
        source,
    })
}
