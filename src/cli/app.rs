//! Main CLI application structure

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::{Output, OutputFormat};
use super::{graph_cmd, query, task, watch, Workspace};
use crate::domain::{TaskId, TaskStatus};
use crate::engine::{ChildPolicy, EngineError};
use crate::storage::{GlobalConfig, Project, StorageBackend};

#[derive(Parser)]
#[command(name = "workq")]
#[command(author, version, about = "A file-backed task queue with hierarchy and blocking dependencies")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workq project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Store tasks as markdown files instead of JSONL
        #[arg(long)]
        markdown: bool,
    },

    /// Add a task
    Add {
        /// Task name
        name: String,

        /// Longer description
        #[arg(long, short)]
        description: Option<String>,

        /// Parent task ID
        #[arg(long, short)]
        parent: Option<TaskId>,
    },

    /// List tasks, oldest first
    List {
        /// Filter by status (todo, in-progress, done)
        #[arg(long, short)]
        status: Option<TaskStatus>,

        /// Only tasks owned by this agent
        #[arg(long, conflicts_with = "unclaimed")]
        owner: Option<String>,

        /// Only tasks with no owner
        #[arg(long)]
        unclaimed: bool,

        /// Only blocked tasks
        #[arg(long, conflicts_with = "unblocked")]
        blocked: bool,

        /// Only unblocked tasks
        #[arg(long)]
        unblocked: bool,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Change a task's name or description
    Edit {
        /// Task ID
        id: TaskId,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New description (empty clears it)
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Set a task's status
    Status {
        /// Task ID
        id: TaskId,

        /// New status (todo, in-progress, done)
        status: String,
    },

    /// Mark a task as in progress
    Start {
        /// Task ID
        id: TaskId,
    },

    /// Mark a task as done
    Done {
        /// Task ID
        id: TaskId,
    },

    /// Set a task's parent
    Parent {
        /// Task to move
        child: TaskId,

        /// New parent
        parent: TaskId,
    },

    /// Make a task a root
    Unparent {
        /// Task ID
        child: TaskId,
    },

    /// Make one task wait on another
    Block {
        /// Task that must finish first
        blocker: TaskId,

        /// Task that waits
        blocked: TaskId,
    },

    /// Remove a blocking dependency
    Unblock {
        /// Task that was being waited on
        blocker: TaskId,

        /// Task that waits
        blocked: TaskId,
    },

    /// Claim a task for an agent
    Claim {
        /// Task ID
        id: TaskId,

        /// Agent name (defaults to [agent] name, $WORKQ_AGENT, then $USER)
        agent: Option<String>,

        /// Take over a task owned by someone else
        #[arg(long)]
        force: bool,
    },

    /// Clear a task's owner
    Unclaim {
        /// Task ID
        id: TaskId,
    },

    /// Append a note to a task
    Note {
        /// Task ID
        id: TaskId,

        /// Note text
        message: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: TaskId,

        /// What to do with children: reject, orphan, reparent, cascade
        #[arg(long)]
        children: Option<ChildPolicy>,
    },

    /// Delete done tasks whose subtree is entirely done
    Prune,

    /// Show the task hierarchy
    Tree {
        /// Include finished branches
        #[arg(long)]
        show_all: bool,
    },

    /// Recommend what to work on next
    Next {
        /// Skip tasks that have an owner
        #[arg(long)]
        unclaimed: bool,
    },

    /// Report inconsistencies in the stored graph
    Check,

    /// Print task changes as they happen
    Watch {
        /// Only report tasks with this status
        #[arg(long, short)]
        status: Option<TaskStatus>,
    },

    /// Rewrite the JSONL store, dropping superseded lines
    Compact,
}

/// Installs the stderr log subscriber
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("workq=debug")
    } else {
        EnvFilter::try_from_env("WORKQ_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let global = GlobalConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable global config");
        GlobalConfig::default()
    });
    let format = cli
        .format
        .or(global.default_format.map(OutputFormat::from))
        .unwrap_or_default();
    let output = Output::new(format).with_color(global.color);

    match dispatch(cli.command, &output) {
        Ok(()) => {
            output.verbose_ctx("run", "Command completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let kind = e.downcast_ref::<EngineError>().map(EngineError::kind);
            output.error(&format!("{:#}", e), kind);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Init { path, markdown } => {
            let backend = if markdown {
                StorageBackend::Markdown
            } else {
                StorageBackend::Jsonl
            };
            output.verbose_ctx("init", &format!("Initializing project at: {}", path.display()));
            let project = Project::init(&path, backend)
                .with_context(|| format!("Failed to initialize {}", path.display()))?;
            output.success(&format!(
                "Initialized workq project at {}",
                project.root().display()
            ));
            Ok(())
        }

        Commands::Add {
            name,
            description,
            parent,
        } => task::add(output, name, description, parent),
        Commands::List {
            status,
            owner,
            unclaimed,
            blocked,
            unblocked,
        } => {
            let blocked = match (blocked, unblocked) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            query::list(output, status, owner, unclaimed, blocked)
        }
        Commands::Show { id } => task::show(output, &id),
        Commands::Edit {
            id,
            name,
            description,
        } => task::edit(output, &id, name, description),
        Commands::Status { id, status } => task::set_status(output, &id, &status),
        Commands::Start { id } => task::set_status(output, &id, TaskStatus::InProgress.as_str()),
        Commands::Done { id } => task::set_status(output, &id, TaskStatus::Done.as_str()),

        Commands::Parent { child, parent } => graph_cmd::parent(output, &child, &parent),
        Commands::Unparent { child } => graph_cmd::unparent(output, &child),
        Commands::Block { blocker, blocked } => graph_cmd::block(output, &blocker, &blocked),
        Commands::Unblock { blocker, blocked } => graph_cmd::unblock(output, &blocker, &blocked),

        Commands::Claim { id, agent, force } => task::claim(output, &id, agent, force),
        Commands::Unclaim { id } => task::unclaim(output, &id),
        Commands::Note { id, message } => task::note(output, &id, &message),
        Commands::Delete { id, children } => task::delete(output, &id, children),
        Commands::Prune => task::prune(output),

        Commands::Tree { show_all } => query::tree(output, show_all),
        Commands::Next { unclaimed } => query::next(output, unclaimed),
        Commands::Check => query::check(output),
        Commands::Watch { status } => watch::run(output, status),
        Commands::Compact => compact(output),
    }
}

fn compact(output: &Output) -> Result<()> {
    let ws = Workspace::open(output)?;

    if ws.project.storage() != StorageBackend::Jsonl {
        output.success("Markdown storage keeps one file per task; nothing to compact");
        return Ok(());
    }

    let store = ws.project.jsonl_store();
    let count = store
        .compact()
        .with_context(|| format!("Failed to compact {}", store.path().display()))?;

    if output.is_json() {
        output.data(&serde_json::json!({ "compacted": count }));
    } else {
        output.success(&format!("Compacted task store: {} task(s)", count));
    }
    Ok(())
}
