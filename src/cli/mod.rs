//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project management | `init`, `compact` |
//! | Task | Work item lifecycle | `add`, `start`, `done`, `claim`, `note` |
//! | Graph | Hierarchy and dependencies | `parent`, `block`, `unblock` |
//! | Query | Read-only views | `list`, `next`, `tree`, `check` |
//! | Watch | Live change feed | `watch --status todo` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag, `default_format` from the global config applies, then
//! `text`.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging on stderr:
//! ```bash
//! workq --verbose next
//! ```
//! `WORKQ_LOG` accepts a tracing filter (e.g. `WORKQ_LOG=workq=debug`).
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod graph_cmd;
mod output;
mod query;
mod task;
mod watch;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

use anyhow::Result;

use crate::engine::Engine;
use crate::storage::{Project, TaskRepository};

/// The current project and an engine over its configured store
pub(crate) struct Workspace {
    pub project: Project,
    pub engine: Engine<Box<dyn TaskRepository>>,
}

impl Workspace {
    pub fn open(output: &Output) -> Result<Self> {
        let project = Project::open_current()?;
        output.verbose_ctx(
            "project",
            &format!(
                "Opened project at {} ({:?} storage)",
                project.root().display(),
                project.storage()
            ),
        );

        let engine = Engine::new(project.repository());
        Ok(Self { project, engine })
    }
}
