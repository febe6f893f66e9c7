//! workq - A file-backed task queue for agents and humans
//!
//! Tasks live in two relations at once: a parent/child hierarchy for
//! decomposition and a `blocked_by` graph for ordering. The [`engine`]
//! validates every mutation against both before committing it through a
//! [`storage::TaskRepository`], and recommends what to work on next.

pub mod cli;
pub mod domain;
pub mod engine;
pub mod storage;

pub use domain::{Task, TaskId, TaskStatus};
pub use engine::{Engine, EngineError};
