// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agent.*` methods.

use hq_core::{AgentId, AgentProvider, AgentRole, AgentState, TeamId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::orchestrator::{AgentFilter, SpawnRequest};
use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

/// Ceiling for `agent.sendPrompt {wait: true}` polling.
const WAIT_CEILING: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListParams {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    team: Option<String>,
    #[serde(default)]
    runtime: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SpawnParams {
    role: String,
    #[serde(default)]
    task: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default)]
    workdir: Option<PathBuf>,
    #[serde(default)]
    team: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SendPromptParams {
    id: String,
    prompt: String,
    #[serde(default)]
    wait: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OutputParams {
    id: String,
    #[serde(default = "default_lines")]
    lines: u32,
}

fn default_lines() -> u32 {
    40
}

fn parse_state(s: &str) -> Result<AgentState, RpcError> {
    serde_json::from_value(Value::String(s.to_string()))
        .map_err(|_| RpcError::invalid_params(format!("unknown agent state: {s}")))
}

pub fn register(table: &mut MethodTable) {
    table.register("agent.list", list);
    table.register("agent.get", get);
    table.register("agent.spawn", spawn);
    table.register("agent.kill", kill);
    table.register("agent.sendPrompt", send_prompt);
    table.register("agent.getOutput", get_output);
    table.register("agent.getAttachCommand", get_attach_command);
}

async fn list(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: ListParams = params(raw)?;
    let filter = AgentFilter {
        state: p.status.as_deref().map(parse_state).transpose()?,
        role: p.role.as_deref().map(AgentRole::parse),
        team: p.team.map(TeamId::from_string),
        runtime: p.runtime,
    };
    result(&ctx.orchestrator.list_agents(&filter))
}

async fn get(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let agent = ctx
        .orchestrator
        .get_agent(&p.id)
        .ok_or_else(|| RpcError::internal(format!("agent not found: {}", p.id)))?;
    result(&agent)
}

async fn spawn(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: SpawnParams = params(raw)?;
    let request = SpawnRequest {
        role: Some(AgentRole::parse(&p.role)),
        provider: p.provider.as_deref().map(AgentProvider::parse),
        template: None,
        working_dir: p.workdir,
        runtime_id: p.runtime,
        team_id: p.team.map(TeamId::from_string),
        task: p.task,
    };
    let reply = ctx.orchestrator.spawn_agent(request).await?;
    result(&reply)
}

async fn kill(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    ctx.orchestrator.kill_agent(AgentId::from_string(p.id)).await?;
    Ok(json!({ "killed": true }))
}

async fn send_prompt(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: SendPromptParams = params(raw)?;
    let output = ctx
        .orchestrator
        .send_prompt(AgentId::from_string(p.id), p.prompt, p.wait, WAIT_CEILING)
        .await?;
    Ok(json!({ "output": output }))
}

async fn get_output(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: OutputParams = params(raw)?;
    let output = ctx.orchestrator.agent_output(&p.id, p.lines).await?;
    Ok(Value::String(output))
}

async fn get_attach_command(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let command = ctx.orchestrator.attach_command(&p.id)?;
    Ok(Value::String(command))
}
