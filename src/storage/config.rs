//! Configuration handling for workq
//!
//! Configuration is stored in `.workq/config.toml` (project) and
//! `~/.config/workq/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PROJECT_DIR;
use crate::engine::ChildPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

/// On-disk encoding used for tasks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// `.workq/tasks.jsonl`, one task per line
    #[default]
    Jsonl,
    /// `.workq/tasks/<id>.md`, YAML frontmatter per task
    Markdown,
}

/// Configuration for agent coordination
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name (defaults to $WORKQ_AGENT, then $USER)
    pub name: Option<String>,
}

impl AgentConfig {
    /// Gets the effective agent name from config, environment, or defaults
    pub fn effective_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| std::env::var("WORKQ_AGENT").ok().filter(|n| !n.trim().is_empty()))
            .or_else(|| std::env::var("USER").ok().filter(|n| !n.trim().is_empty()))
            .unwrap_or_else(|| "anonymous".to_string())
    }
}

/// Settings for `workq watch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a burst of file events triggers a reload
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

/// Settings for `workq delete`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeleteConfig {
    /// What happens to children when no `--children` flag is given
    pub children: ChildPolicy,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Task encoding
    pub storage: StorageBackend,

    /// Agent coordination settings
    pub agent: AgentConfig,

    /// Watch settings
    pub watch: WatchConfig,

    /// Deletion settings
    pub delete: DeleteConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Output format when `--format` is not given
    pub default_format: Option<OutputFormat>,

    /// Colored status labels in text output
    pub color: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            default_format: None,
            color: true,
        }
    }
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl ProjectConfig {
    /// Path of the project config file under `project_root`
    pub fn path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join("config.toml")
    }

    /// Loads the project config, falling back to defaults if absent
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        read_toml(&Self::path(project_root))
    }

    /// Writes the project config
    pub fn save(&self, project_root: &Path) -> Result<(), ConfigError> {
        let path = Self::path(project_root);
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Write {
            path,
            message: e.to_string(),
        })
    }
}

impl GlobalConfig {
    /// Returns the global config directory
    pub fn dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "workq", "workq").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::dir() {
            Some(dir) => read_toml(&dir.join("config.toml")),
            None => Ok(Self::default()),
        }
    }
}

/// Finds the project root by looking for a `.workq/` directory
pub fn find_project_root() -> Option<PathBuf> {
    let current = std::env::current_dir().ok()?;
    find_project_root_from(&current)
}

/// Walks up from `start` looking for a `.workq/` directory
pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(PROJECT_DIR).is_dir() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

fn read_toml<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
