// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kanban.*` methods.

use hq_core::{AgentProvider, KanbanColumn, LaneId, LaneToggles, SwimLane, TaskId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateLaneParams {
    name: String,
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default)]
    working_directory: Option<PathBuf>,
    #[serde(default)]
    session_name: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    default_toggles: Option<LaneToggles>,
    #[serde(default)]
    context_instructions: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EditLaneParams {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    working_directory: Option<PathBuf>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    default_toggles: Option<LaneToggles>,
    #[serde(default)]
    context_instructions: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

pub fn register(table: &mut MethodTable) {
    table.register("kanban.listLanes", list_lanes);
    table.register("kanban.createLane", create_lane);
    table.register("kanban.editLane", edit_lane);
    table.register("kanban.deleteLane", delete_lane);
    table.register("kanban.getBoard", get_board);
    table.register("kanban.createTask", create_task);
    table.register("kanban.startTask", start_task);
    table.register("kanban.stopTask", stop_task);
}

async fn list_lanes(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    result(&ctx.kanban.list_lanes()?)
}

async fn create_lane(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: CreateLaneParams = params(raw)?;
    let runtime_id = p
        .runtime
        .or_else(|| ctx.runtimes.default_id().map(str::to_string))
        .ok_or_else(|| RpcError::invalid_params("no runtime configured"))?;

    let mut lane = SwimLane::new(p.name, runtime_id, chrono::Utc::now());
    if let Some(dir) = p.working_directory {
        lane.working_directory = dir;
    }
    if let Some(session) = p.session_name {
        lane.session_name = session;
    }
    lane.provider = p.provider.as_deref().map(AgentProvider::parse);
    lane.model = p.model;
    lane.default_toggles = p.default_toggles.unwrap_or_default();
    lane.context_instructions = p.context_instructions;

    result(&ctx.kanban.create_lane(lane)?)
}

async fn edit_lane(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: EditLaneParams = params(raw)?;
    let mut lane = ctx.kanban.get_lane(&p.id)?;
    if let Some(name) = p.name {
        lane.name = name;
    }
    if let Some(dir) = p.working_directory {
        lane.working_directory = dir;
    }
    if let Some(provider) = p.provider {
        lane.provider = Some(AgentProvider::parse(&provider));
    }
    if let Some(model) = p.model {
        lane.model = Some(model);
    }
    if let Some(toggles) = p.default_toggles {
        lane.default_toggles = toggles;
    }
    if let Some(instructions) = p.context_instructions {
        lane.context_instructions = Some(instructions);
    }
    result(&ctx.kanban.edit_lane(lane)?)
}

async fn delete_lane(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    ctx.kanban.delete_lane(&LaneId::from_string(p.id))?;
    Ok(json!({ "deleted": true }))
}

async fn get_board(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let board = ctx.kanban.board()?;
    let mut out = serde_json::Map::new();
    for column in KanbanColumn::ALL {
        let tasks = board.get(&column).cloned().unwrap_or_default();
        out.insert(column.to_string(), serde_json::to_value(tasks).unwrap_or_default());
    }
    Ok(Value::Object(out))
}

/// Create a task on the board. Lane defaults stamp unset toggles; the
/// task is enqueued right away when its effective `autoStart` is true.
async fn create_task(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: super::task::SubmitParams = params(raw)?;
    let task = ctx.kanban.create_task(p.into_new_task())?;
    if ctx.kanban.effective_toggles(&task)?.auto_start {
        let started = ctx.kanban.start_task(&task.id)?;
        ctx.orchestrator.enqueue_task(started.id.clone()).await?;
    }
    result(&ctx.kanban.get_task(task.id.as_str())?)
}

async fn start_task(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let task = ctx.kanban.start_task(&TaskId::from_string(p.id))?;
    ctx.orchestrator.enqueue_task(task.id.clone()).await?;
    result(&ctx.kanban.get_task(task.id.as_str())?)
}

async fn stop_task(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let id = TaskId::from_string(p.id);
    ctx.orchestrator.dequeue_task(id.clone()).await?;
    result(&ctx.kanban.stop_task(&id)?)
}
