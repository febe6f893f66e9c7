//! Live change feed for `workq watch`
//!
//! Subscribes to `.workq/` and reloads the task set after each debounced
//! batch of file events. The first reload prints a `snapshot` event; later
//! ones print only what changed.

use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;

use super::output::Output;
use super::task::task_line;
use super::Workspace;
use crate::domain::{Snapshot, TaskStatus, WatchEvent};
use crate::storage::TaskRepository;

pub fn run(output: &Output, status: Option<TaskStatus>) -> Result<()> {
    let ws = Workspace::open(output)?;
    let watch_dir = ws.project.project_dir();
    let debounce_ms = ws.project.config().watch.debounce_ms;

    let mut snapshot = Snapshot::new(status);
    emit(output, &mut snapshot, &ws)?;

    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms), tx)
        .context("Failed to start file watcher")?;
    debouncer
        .watcher()
        .watch(&watch_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", watch_dir.display()))?;

    output.verbose_ctx(
        "watch",
        &format!("Watching {} (debounce: {}ms)", watch_dir.display(), debounce_ms),
    );

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                if !events.iter().any(|e| is_task_file(&e.path)) {
                    continue;
                }
                output.verbose_ctx("watch", &format!("Detected {} change(s)", events.len()));

                // A reload can race a writer; the next batch retries.
                if let Err(e) = emit(output, &mut snapshot, &ws) {
                    tracing::warn!(error = %e, "failed to reload tasks");
                }
            }
            Ok(Err(error)) => {
                tracing::warn!(?error, "watch error");
            }
            Err(_) => break,
        }
    }

    Ok(())
}

/// Reloads the task set and prints the resulting events
fn emit(output: &Output, snapshot: &mut Snapshot, ws: &Workspace) -> Result<()> {
    let tasks = ws.engine.repository().load_all()?;

    for event in snapshot.advance(tasks, Utc::now()) {
        if output.is_json() {
            output.data(&event);
        } else {
            print_event(output, &event);
        }
    }
    Ok(())
}

fn print_event(output: &Output, event: &WatchEvent) {
    match event {
        WatchEvent::Snapshot { tasks, timestamp } => {
            println!(
                "[{}] {} task(s)",
                timestamp.format("%H:%M:%S"),
                tasks.len()
            );
            for task in tasks {
                println!("  {}", task_line(output, task, false));
            }
        }
        WatchEvent::Added { task, timestamp } => {
            println!(
                "[{}] + {}",
                timestamp.format("%H:%M:%S"),
                task_line(output, task, false)
            );
        }
        WatchEvent::Updated { task, timestamp } => {
            println!(
                "[{}] ~ {}",
                timestamp.format("%H:%M:%S"),
                task_line(output, task, false)
            );
        }
        WatchEvent::Deleted { task_id, timestamp } => {
            println!("[{}] - {}", timestamp.format("%H:%M:%S"), task_id);
        }
    }
}

/// Whether a changed path can affect the task set
fn is_task_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("tmp") => false,
        Some("jsonl") | Some("md") => true,
        // Directory events (the markdown tasks dir itself)
        None => path.file_name().is_some_and(|n| n == "tasks"),
        _ => false,
    }
}
