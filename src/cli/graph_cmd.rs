//! Hierarchy and dependency edge commands

use anyhow::Result;

use super::output::Output;
use super::Workspace;
use crate::domain::TaskId;

pub fn parent(output: &Output, child: &TaskId, parent: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.add_parent_edge(child, parent)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("{} is now a child of {}", child, parent));
    }
    Ok(())
}

pub fn unparent(output: &Output, child: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.remove_parent_edge(child)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("{} is now a root task", child));
    }
    Ok(())
}

pub fn block(output: &Output, blocker: &TaskId, blocked: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.add_block_edge(blocker, blocked)?;
    output.verbose_ctx(
        "block",
        &format!("{} now waits on {} task(s)", blocked, task.blocked_by.len()),
    );

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("{} is now blocked by {}", blocked, blocker));
    }
    Ok(())
}

pub fn unblock(output: &Output, blocker: &TaskId, blocked: &TaskId) -> Result<()> {
    let ws = Workspace::open(output)?;
    let task = ws.engine.remove_block_edge(blocker, blocked)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("{} no longer waits on {}", blocked, blocker));
    }
    Ok(())
}
