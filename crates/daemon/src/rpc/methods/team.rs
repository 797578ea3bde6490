// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `team.*` methods.

use hq_core::{AgentId, AgentRole, Team, TeamId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::orchestrator::SpawnRequest;
use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateParams {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MemberParams {
    team: String,
    agent: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QuickParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    runtime: Option<String>,
}

pub fn register(table: &mut MethodTable) {
    table.register("team.list", list);
    table.register("team.create", create);
    table.register("team.delete", delete);
    table.register("team.addAgent", add_agent);
    table.register("team.removeAgent", remove_agent);
    table.register("team.quickCode", quick_code);
    table.register("team.quickResearch", quick_research);
}

fn load_team(ctx: &RpcContext, id: &str) -> Result<Team, RpcError> {
    ctx.store
        .get_team(id)?
        .ok_or_else(|| RpcError::internal(format!("team not found: {id}")))
}

async fn list(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let mut teams = ctx.store.list_teams()?;
    teams.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    result(&teams)
}

async fn create(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: CreateParams = params(raw)?;
    let team = Team::new(p.name, chrono::Utc::now());
    ctx.store.put_team(&team)?;
    result(&team)
}

async fn delete(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    if !ctx.store.delete_team(&p.id)? {
        return Err(RpcError::internal(format!("team not found: {}", p.id)));
    }
    Ok(json!({ "deleted": true }))
}

async fn add_agent(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: MemberParams = params(raw)?;
    let mut team = load_team(&ctx, &p.team)?;
    if ctx.orchestrator.get_agent(&p.agent).is_none() {
        return Err(RpcError::internal(format!("agent not found: {}", p.agent)));
    }
    team.add_agent(AgentId::from_string(p.agent));
    ctx.store.put_team(&team)?;
    result(&team)
}

async fn remove_agent(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: MemberParams = params(raw)?;
    let mut team = load_team(&ctx, &p.team)?;
    if !team.remove_agent(&AgentId::from_string(p.agent.clone())) {
        return Err(RpcError::internal(format!("agent {} is not in team", p.agent)));
    }
    ctx.store.put_team(&team)?;
    result(&team)
}

/// Spawn a team with the given roles, collecting the members as they come up.
async fn spawn_team(
    ctx: &Arc<RpcContext>,
    name: String,
    runtime: Option<String>,
    roles: &[AgentRole],
) -> Result<Team, RpcError> {
    let mut team = Team::new(name, chrono::Utc::now());
    ctx.store.put_team(&team)?;

    for role in roles {
        let request = SpawnRequest {
            role: Some(role.clone()),
            runtime_id: runtime.clone(),
            team_id: Some(team.id.clone()),
            ..Default::default()
        };
        let reply = ctx.orchestrator.spawn_agent(request).await?;
        team.add_agent(reply.id);
    }
    ctx.store.put_team(&team)?;
    Ok(team)
}

/// Coder + reviewer + tester, ready for a feature branch.
async fn quick_code(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: QuickParams = params(raw)?;
    let name = p.name.unwrap_or_else(|| "code".to_string());
    let team = spawn_team(
        &ctx,
        name,
        p.runtime,
        &[AgentRole::Coder, AgentRole::Reviewer, AgentRole::Tester],
    )
    .await?;
    result(&team)
}

/// Three researchers for a fan-out investigation.
async fn quick_research(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: QuickParams = params(raw)?;
    let name = p.name.unwrap_or_else(|| "research".to_string());
    let team = spawn_team(
        &ctx,
        name,
        p.runtime,
        &[AgentRole::Researcher, AgentRole::Researcher, AgentRole::Researcher],
    )
    .await?;
    result(&team)
}
