//! Read-only query commands

use anyhow::Result;

use super::output::Output;
use super::task::task_line;
use super::Workspace;
use crate::domain::{NextOptions, NextTask, TaskStatus};
use crate::engine::{ListFilter, TreeNode};

pub fn list(
    output: &Output,
    status: Option<TaskStatus>,
    owner: Option<String>,
    unclaimed: bool,
    blocked: Option<bool>,
) -> Result<()> {
    let ws = Workspace::open(output)?;
    let filter = ListFilter {
        status,
        owner,
        unclaimed,
        blocked,
    };
    let tasks = ws.engine.list_tasks(&filter)?;

    if output.is_json() {
        output.data(&tasks);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    println!("{:<9} {:<11} NAME", "ID", "STATUS");
    println!("{}", "-".repeat(60));
    for listed in &tasks {
        println!("{}", task_line(output, &listed.task, listed.blocked));
    }

    Ok(())
}

pub fn next(output: &Output, unclaimed: bool) -> Result<()> {
    let ws = Workspace::open(output)?;
    let next = ws.engine.next_task(NextOptions {
        unclaimed_only: unclaimed,
    })?;

    if output.is_json() {
        output.data(&next);
        return Ok(());
    }

    match next {
        NextTask::Task { task } => {
            println!("Next: {} - {}", task.id, task.name);
            if let Some(parent) = &task.parent {
                println!("{}", output.dim(&format!("  under {}", parent)));
            }
        }
        NextTask::Candidates { tasks } => {
            println!("Nothing in progress. Available root tasks:");
            for task in &tasks {
                println!("  {}", task_line(output, task, false));
            }
        }
        NextTask::Empty { blocked_count } if blocked_count > 0 => {
            println!("No available tasks ({} blocked)", blocked_count);
        }
        NextTask::Empty { .. } => println!("No available tasks"),
    }

    Ok(())
}

pub fn tree(output: &Output, show_all: bool) -> Result<()> {
    let ws = Workspace::open(output)?;
    let forest = ws.engine.tree(show_all)?;

    if output.is_json() {
        output.data(&forest);
    } else if forest.is_empty() {
        println!("No tasks");
    } else {
        for node in &forest {
            print_node(output, node, 0);
        }
    }

    Ok(())
}

fn print_node(output: &Output, node: &TreeNode, depth: usize) {
    println!(
        "{}{}",
        "  ".repeat(depth),
        task_line(output, &node.task, false)
    );
    for child in &node.children {
        print_node(output, child, depth + 1);
    }
}

pub fn check(output: &Output) -> Result<()> {
    let ws = Workspace::open(output)?;
    let violations = ws.engine.check()?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "ok": violations.is_empty(),
            "violations": violations,
        }));
    } else if violations.is_empty() {
        output.success("No problems found");
    } else {
        for violation in &violations {
            println!("  - {}", violation.describe());
        }
    }

    if !violations.is_empty() {
        anyhow::bail!("{} problem(s) found", violations.len());
    }
    Ok(())
}
