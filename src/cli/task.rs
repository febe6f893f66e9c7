//! Task lifecycle commands

use anyhow::{Context, Result};

use super::output::Output;
use super::Workspace;
use crate::domain::{Task, TaskId};
use crate::engine::{ChildPolicy, NewTask, TaskEdit};

/// One-line summary used by listings
pub(super) fn task_line(output: &Output, task: &Task, blocked: bool) -> String {
    let mut line = format!(
        "{:<9} {} {}",
        task.id,
        output.status_label(task.status),
        task.name
    );
    if blocked {
        line.push(' ');
        line.push_str(&output.blocked_label());
    }
    if let Some(owner) = task.owner.as_deref().filter(|o| !o.is_empty()) {
        line.push(' ');
        line.push_str(&output.dim(&format!("@{}", owner)));
    }
    line
}

pub fn add(
    output: &Output,
    name: String,
    description: Option<String>,
    parent: Option<TaskId>,
) -> Result<()> {
    let ws = Workspace::open(output)?;

    let mut request = NewTask::named(name);
    request.description = description;
    request.parent = parent;

    let task = ws.engine.add_task(request)?;
    output.verbose_ctx("add", &format!("Created {} ({} notes)", task.id, task.notes.len()));

    if output.is_json() {
        output.data(&task);
    } else {
        match &task.parent {
            Some(parent) => output.success(&format!(
                "Created task: {} - {} (under {})",
                task.id, task.name, parent
            )),
            None => output.success(&format!("Created task: {} - {}", task.id, task.name)),
        }
    }

    Ok(())
}

pub fn show(output: &Output, id: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let details = ws.engine.show_task(id)?;

    if output.is_json() {
        output.data(&details);
        return Ok(());
    }

    let task = &details.task;
    println!("Task: {}", task.id);
    println!("Name: {}", task.name);
    println!("Status: {}", task.status);
    if let Some(parent) = &task.parent {
        println!("Parent: {}", parent);
    }
    if let Some(owner) = &task.owner {
        println!("Owner: {}", owner);
    }
    println!("Created: {}", task.created.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", task.updated.format("%Y-%m-%d %H:%M"));

    if let Some(desc) = &task.description {
        println!("\nDescription:");
        println!("{}", desc);
    }

    if !task.blocked_by.is_empty() {
        println!("\nBlocked by:");
        for blocker in &task.blocked_by {
            let state = if details.unresolved_blockers.contains(blocker) {
                "waiting"
            } else {
                "resolved"
            };
            println!("  {} ({})", blocker, state);
        }
    }

    if !details.children.is_empty() {
        println!("\nChildren:");
        for child in &details.children {
            println!("  {}", child);
        }
    }

    if !details.dependents.is_empty() {
        println!("\nBlocks:");
        for dependent in &details.dependents {
            println!("  {}", dependent);
        }
    }

    if !task.notes.is_empty() {
        println!("\nNotes:");
        for note in &task.notes {
            println!(
                "  [{}] {}",
                note.timestamp.format("%Y-%m-%d %H:%M"),
                note.content
            );
        }
    }

    if details.blocked {
        println!("\n{}", output.blocked_label());
    }

    Ok(())
}

pub fn edit(
    output: &Output,
    id: &TaskId,
    name: Option<String>,
    description: Option<String>,
) -> Result<()> {
    if name.is_none() && description.is_none() {
        anyhow::bail!("Nothing to edit: pass --name and/or --description");
    }

    let ws = Workspace::open(output)?;
    let task = ws.engine.edit_task(id, TaskEdit { name, description })?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Updated task: {} - {}", task.id, task.name));
    }

    Ok(())
}

pub fn set_status(output: &Output, id: &TaskId, status: &str) -> Result<()> {
    let ws = Workspace::open(output)?;
    let outcome = ws.engine.change_status_str(id, status)?;

    if output.is_json() {
        output.data(&outcome);
        return Ok(());
    }

    output.success(&format!(
        "{} is now {}",
        outcome.task.id, outcome.task.status
    ));
    if !outcome.unblocked.is_empty() {
        let ids: Vec<String> = outcome.unblocked.iter().map(|id| id.to_string()).collect();
        println!("Unblocked: {}", ids.join(", "));
    }

    Ok(())
}

pub fn claim(output: &Output, id: &TaskId, agent: Option<String>, force: bool) -> Result<()> {
    let ws = Workspace::open(output)?;
    let agent = agent.unwrap_or_else(|| ws.project.config().agent.effective_name());
    output.verbose_ctx("claim", &format!("Claiming {} as {}", id, agent));

    let task = ws.engine.claim(id, &agent, force)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Claimed {} for {}", task.id, agent));
    }

    Ok(())
}

pub fn unclaim(output: &Output, id: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.unclaim(id)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Released {}", task.id));
    }

    Ok(())
}

pub fn note(output: &Output, id: &TaskId, message: &str) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.add_note(id, message)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Added note to {} ({} total)", task.id, task.notes.len()));
    }

    Ok(())
}

pub fn delete(output: &Output, id: &TaskId, children: Option<ChildPolicy>) -> Result<()> {
    let ws = Workspace::open(output)?;
    let policy = children.unwrap_or(ws.project.config().delete.children);
    output.verbose_ctx("delete", &format!("Deleting {} with policy {}", id, policy));

    let outcome = ws
        .engine
        .delete_task(id, policy)
        .with_context(|| format!("Failed to delete {}", id))?;

    if output.is_json() {
        output.data(&outcome);
        return Ok(());
    }

    output.success(&format!("Deleted {} task(s)", outcome.deleted.len()));
    for deleted in &outcome.deleted {
        println!("  - {}", deleted);
    }
    if !outcome.moved.is_empty() {
        let ids: Vec<String> = outcome.moved.iter().map(|id| id.to_string()).collect();
        println!("Moved: {}", ids.join(", "));
    }

    Ok(())
}

pub fn prune(output: &Output) -> Result<()> {
    let ws = Workspace::open(output)?;
    let pruned = ws.engine.prune()?;

    if output.is_json() {
        output.data(&serde_json::json!({ "pruned": pruned }));
    } else if pruned.is_empty() {
        println!("Nothing to prune");
    } else {
        output.success(&format!("Pruned {} done task(s)", pruned.len()));
    }

    Ok(())
}
