// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq task` - task queue commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use super::agent::strip_nulls;
use super::CommandContext;
use crate::output::{format_or_json, print_table};

#[derive(Subcommand)]
pub enum TaskCommand {
    /// List tasks
    List {
        #[arg(long)]
        lane: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one task
    Get { id: String },
    /// Submit a task to the queue
    Submit {
        description: String,
        /// Target role for assignment
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value = "0")]
        priority: i32,
        #[arg(long)]
        lane: Option<String>,
        /// Task IDs this task depends on
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
    },
    /// Move a task to a board column
    Move { id: String, column: String },
    /// Cancel a task (interrupts the assigned agent)
    Cancel { id: String },
    /// Delete a task
    Delete { id: String },
    /// Mark a task completed or failed
    Complete {
        id: String,
        /// Record the task as failed instead
        #[arg(long)]
        failed: bool,
        #[arg(long)]
        output: Option<String>,
    },
}

pub async fn run(command: TaskCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        TaskCommand::List { lane, status } => {
            let params = strip_nulls(json!({ "lane": lane, "status": status }));
            let tasks = ctx.client.call("task.list", params).await?;
            format_or_json(ctx.json, &tasks, || {
                print_table(
                    tasks.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[
                        ("ID", "id"),
                        ("STATUS", "status"),
                        ("COLUMN", "column"),
                        ("PRIORITY", "priority"),
                        ("AGENT", "assignedAgentId"),
                        ("DESCRIPTION", "description"),
                    ],
                );
            })
        }
        TaskCommand::Get { id } => {
            let task = ctx.client.call("task.get", json!({ "id": id })).await?;
            format_or_json(ctx.json, &task, || {
                println!("{}", serde_json::to_string_pretty(&task).unwrap_or_default());
            })
        }
        TaskCommand::Submit { description, role, priority, lane, depends_on } => {
            let params = strip_nulls(json!({
                "description": description,
                "role": role,
                "priority": priority,
                "lane": lane,
                "dependsOn": depends_on,
            }));
            let task = ctx.client.call("task.submit", params).await?;
            format_or_json(ctx.json, &task, || {
                println!("Submitted {}", task["id"].as_str().unwrap_or("-"));
            })
        }
        TaskCommand::Move { id, column } => {
            let task =
                ctx.client.call("task.move", json!({ "id": id, "column": column })).await?;
            format_or_json(ctx.json, &task, || {
                println!(
                    "{} -> {} ({})",
                    task["id"].as_str().unwrap_or("-"),
                    task["column"].as_str().unwrap_or("-"),
                    task["status"].as_str().unwrap_or("-")
                );
            })
        }
        TaskCommand::Cancel { id } => {
            ctx.client.call("task.cancel", json!({ "id": id })).await?;
            println!("Task cancelled: {id}");
            Ok(())
        }
        TaskCommand::Delete { id } => {
            ctx.client.call("task.delete", json!({ "id": id })).await?;
            println!("Task deleted: {id}");
            Ok(())
        }
        TaskCommand::Complete { id, failed, output } => {
            let params = strip_nulls(json!({
                "id": id,
                "success": !failed,
                "output": output,
            }));
            let task = ctx.client.call("task.complete", params).await?;
            format_or_json(ctx.json, &task, || {
                println!(
                    "Task {}: {}",
                    task["id"].as_str().unwrap_or("-"),
                    task["status"].as_str().unwrap_or("-")
                );
            })
        }
    }
}
