// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq agent` - agent management commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Value};

use super::CommandContext;
use crate::output::{format_or_json, print_table};

#[derive(Subcommand)]
pub enum AgentCommand {
    /// List agents
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        runtime: Option<String>,
    },
    /// Show one agent
    Get { id: String },
    /// Spawn an agent
    Spawn {
        /// Role (coder, reviewer, tester, devops, researcher, ...)
        role: String,
        /// Task description to enqueue after the spawn
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        runtime: Option<String>,
        #[arg(long)]
        workdir: Option<String>,
        #[arg(long)]
        team: Option<String>,
    },
    /// Kill an agent's session
    Kill { id: String },
    /// Send a prompt to an agent
    Prompt {
        id: String,
        prompt: String,
        /// Wait for output and print the terminal tail
        #[arg(long)]
        wait: bool,
    },
    /// Capture an agent's recent terminal output
    Output {
        id: String,
        #[arg(short = 'n', long, default_value = "40")]
        lines: u32,
    },
    /// Print the command to attach to an agent's terminal
    Attach { id: String },
}

pub async fn run(command: AgentCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        AgentCommand::List { status, role, runtime } => {
            let params = json!({ "status": status, "role": role, "runtime": runtime });
            let agents = ctx.client.call("agent.list", strip_nulls(params)).await?;
            format_or_json(ctx.json, &agents, || {
                print_table(
                    agents.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[
                        ("ID", "id"),
                        ("NAME", "name"),
                        ("ROLE", "role"),
                        ("STATE", "state"),
                        ("RUNTIME", "runtimeId"),
                        ("TASK", "currentTaskId"),
                    ],
                );
            })
        }
        AgentCommand::Get { id } => {
            let agent = ctx.client.call("agent.get", json!({ "id": id })).await?;
            format_or_json(ctx.json, &agent, || {
                println!("{}", serde_json::to_string_pretty(&agent).unwrap_or_default());
            })
        }
        AgentCommand::Spawn { role, task, provider, runtime, workdir, team } => {
            let params = json!({
                "role": role,
                "task": task,
                "provider": provider,
                "runtime": runtime,
                "workdir": workdir,
                "team": team,
            });
            let reply = ctx.client.call("agent.spawn", strip_nulls(params)).await?;
            format_or_json(ctx.json, &reply, || {
                println!(
                    "Spawned {} ({})",
                    reply["id"].as_str().unwrap_or("-"),
                    reply["state"].as_str().unwrap_or("-")
                );
            })
        }
        AgentCommand::Kill { id } => {
            ctx.client.call("agent.kill", json!({ "id": id })).await?;
            println!("Agent killed: {id}");
            Ok(())
        }
        AgentCommand::Prompt { id, prompt, wait } => {
            let reply = ctx
                .client
                .call("agent.sendPrompt", json!({ "id": id, "prompt": prompt, "wait": wait }))
                .await?;
            format_or_json(ctx.json, &reply, || {
                match reply["output"].as_str() {
                    Some(output) => println!("{output}"),
                    None => println!("Prompt sent"),
                }
            })
        }
        AgentCommand::Output { id, lines } => {
            let output =
                ctx.client.call("agent.getOutput", json!({ "id": id, "lines": lines })).await?;
            println!("{}", output.as_str().unwrap_or(""));
            Ok(())
        }
        AgentCommand::Attach { id } => {
            let command = ctx.client.call("agent.getAttachCommand", json!({ "id": id })).await?;
            println!("{}", command.as_str().unwrap_or(""));
            Ok(())
        }
    }
}

/// Remove null-valued keys so optional CLI flags stay absent on the wire.
pub(super) fn strip_nulls(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}
