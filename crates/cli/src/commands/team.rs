// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq team` - agent team commands.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use super::agent::strip_nulls;
use super::CommandContext;
use crate::output::{format_or_json, print_table};

#[derive(Subcommand)]
pub enum TeamCommand {
    /// List teams
    List,
    /// Create an empty team
    Create { name: String },
    /// Delete a team (agents keep running)
    Delete { id: String },
    /// Add an agent to a team
    Add { team: String, agent: String },
    /// Remove an agent from a team
    Remove { team: String, agent: String },
    /// Spawn a coder + reviewer + tester team
    QuickCode {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        runtime: Option<String>,
    },
    /// Spawn a trio of researchers
    QuickResearch {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        runtime: Option<String>,
    },
}

pub async fn run(command: TeamCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        TeamCommand::List => {
            let teams = ctx.client.call("team.list", json!({})).await?;
            format_or_json(ctx.json, &teams, || {
                print_table(
                    teams.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[("ID", "id"), ("NAME", "name")],
                );
            })
        }
        TeamCommand::Create { name } => {
            let team = ctx.client.call("team.create", json!({ "name": name })).await?;
            format_or_json(ctx.json, &team, || {
                println!("Team created: {}", team["id"].as_str().unwrap_or("-"));
            })
        }
        TeamCommand::Delete { id } => {
            ctx.client.call("team.delete", json!({ "id": id })).await?;
            println!("Team deleted: {id}");
            Ok(())
        }
        TeamCommand::Add { team, agent } => {
            ctx.client.call("team.addAgent", json!({ "team": team, "agent": agent })).await?;
            println!("Added {agent} to {team}");
            Ok(())
        }
        TeamCommand::Remove { team, agent } => {
            ctx.client
                .call("team.removeAgent", json!({ "team": team, "agent": agent }))
                .await?;
            println!("Removed {agent} from {team}");
            Ok(())
        }
        TeamCommand::QuickCode { name, runtime } => {
            let params = strip_nulls(json!({ "name": name, "runtime": runtime }));
            let team = ctx.client.call("team.quickCode", params).await?;
            print_team(ctx, &team)
        }
        TeamCommand::QuickResearch { name, runtime } => {
            let params = strip_nulls(json!({ "name": name, "runtime": runtime }));
            let team = ctx.client.call("team.quickResearch", params).await?;
            print_team(ctx, &team)
        }
    }
}

fn print_team(ctx: &CommandContext, team: &serde_json::Value) -> Result<()> {
    format_or_json(ctx.json, team, || {
        println!("Team {} ready:", team["name"].as_str().unwrap_or("-"));
        for agent in team["agentIds"].as_array().cloned().unwrap_or_default() {
            println!("  {}", agent.as_str().unwrap_or("-"));
        }
    })
}
