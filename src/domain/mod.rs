//! Domain models for workq
//!
//! The task graph and every rule over it, without any I/O concerns.

mod graph;
mod id;
mod invariants;
mod next;
mod task;
pub mod transition;
mod watch;

pub use graph::{sort_by_created, DependencyGraph, GraphError, TaskGraph};
pub use id::{IdError, TaskId, GENERATED_ID_LEN};
pub use invariants::{check, would_create_block_cycle, would_create_parent_cycle, Violation};
pub use next::{select_next, NextOptions, NextTask};
pub use task::{BlockedBy, Note, ParseStatusError, Task, TaskStatus};
pub use watch::{Snapshot, WatchEvent};
