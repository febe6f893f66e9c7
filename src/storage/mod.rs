//! # Storage Layer
//!
//! Persistence for workq with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks (default) | JSONL (one JSON per line) | `.workq/tasks.jsonl` |
//! | Tasks (markdown) | Markdown + YAML frontmatter | `.workq/tasks/{id}.md` |
//! | Config | TOML | `.workq/config.toml` |
//!
//! ## Write Safety
//!
//! - [`JsonlStore`] uses file locking (`fs2`) and rewrites the whole file
//! - [`MarkdownStore`] stages every file before renaming any into place
//! - Single-file writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`TaskRepository`] - The load/save contract the engine consumes
//! - [`Project`] - Entry point for accessing a workq project
//! - [`ProjectConfig`] / [`GlobalConfig`] - Project and user configuration

mod config;
mod jsonl;
mod markdown;
mod memory;
mod project;
mod repository;

/// Name of the per-project directory
pub const PROJECT_DIR: &str = ".workq";

pub use config::{
    find_project_root, find_project_root_from, AgentConfig, ConfigError, DeleteConfig,
    GlobalConfig, OutputFormat, ProjectConfig, StorageBackend, WatchConfig,
};
pub use jsonl::JsonlStore;
pub use markdown::MarkdownStore;
pub use memory::MemoryStore;
pub use project::{Project, ProjectError};
pub use repository::{Changeset, RepositoryError, TaskRepository};
