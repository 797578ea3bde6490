// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq kanban` - board and swimlane commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use super::agent::strip_nulls;
use super::CommandContext;
use crate::output::{format_or_json, print_table, short_id};

#[derive(Subcommand)]
pub enum KanbanCommand {
    /// List swimlanes
    Lanes,
    /// Create a swimlane
    CreateLane {
        name: String,
        #[arg(long)]
        runtime: Option<String>,
        #[arg(long)]
        workdir: Option<String>,
        /// Auto-start tasks created in this lane
        #[arg(long)]
        auto_start: bool,
        /// Auto-close finished tasks in this lane
        #[arg(long)]
        auto_close: bool,
    },
    /// Delete a swimlane
    DeleteLane { id: String },
    /// Show the board grouped by column
    Board,
    /// Create a task on the board
    CreateTask {
        description: String,
        #[arg(long)]
        lane: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Move a task to in_progress and hand it to the orchestrator
    Start { id: String },
    /// Pull a task back to todo, cancelling its assignment
    Stop { id: String },
}

pub async fn run(command: KanbanCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        KanbanCommand::Lanes => {
            let lanes = ctx.client.call("kanban.listLanes", json!({})).await?;
            format_or_json(ctx.json, &lanes, || {
                print_table(
                    lanes.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[
                        ("ID", "id"),
                        ("NAME", "name"),
                        ("RUNTIME", "runtimeId"),
                        ("SESSION", "sessionName"),
                    ],
                );
            })
        }
        KanbanCommand::CreateLane { name, runtime, workdir, auto_start, auto_close } => {
            let params = strip_nulls(json!({
                "name": name,
                "runtime": runtime,
                "workingDirectory": workdir,
                "defaultToggles": { "autoStart": auto_start, "autoClose": auto_close },
            }));
            let lane = ctx.client.call("kanban.createLane", params).await?;
            format_or_json(ctx.json, &lane, || {
                println!("Lane created: {}", lane["id"].as_str().unwrap_or("-"));
            })
        }
        KanbanCommand::DeleteLane { id } => {
            ctx.client.call("kanban.deleteLane", json!({ "id": id })).await?;
            println!("Lane deleted: {id}");
            Ok(())
        }
        KanbanCommand::Board => {
            let board = ctx.client.call("kanban.getBoard", json!({})).await?;
            format_or_json(ctx.json, &board, || {
                for column in ["backlog", "todo", "in_progress", "in_review", "done"] {
                    let tasks = board[column].as_array().cloned().unwrap_or_default();
                    println!("{} ({})", column.to_uppercase(), tasks.len());
                    for task in tasks {
                        println!(
                            "  {}  {}",
                            short_id(&task["id"]),
                            task["description"].as_str().unwrap_or("-")
                        );
                    }
                }
            })
        }
        KanbanCommand::CreateTask { description, lane, role } => {
            let params = strip_nulls(json!({
                "description": description,
                "lane": lane,
                "role": role,
            }));
            let task = ctx.client.call("kanban.createTask", params).await?;
            format_or_json(ctx.json, &task, || {
                println!("Task created: {}", task["id"].as_str().unwrap_or("-"));
            })
        }
        KanbanCommand::Start { id } => {
            let task = ctx.client.call("kanban.startTask", json!({ "id": id })).await?;
            format_or_json(ctx.json, &task, || {
                println!("Task started: {}", task["id"].as_str().unwrap_or("-"));
            })
        }
        KanbanCommand::Stop { id } => {
            let task = ctx.client.call("kanban.stopTask", json!({ "id": id })).await?;
            format_or_json(ctx.json, &task, || {
                println!("Task stopped: {}", task["id"].as_str().unwrap_or("-"));
            })
        }
    }
}
