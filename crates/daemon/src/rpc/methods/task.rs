// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `task.*` methods.

use hq_core::{AgentRole, KanbanColumn, LaneId, TaskId, Toggles};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::kanban::NewTask;
use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ListParams {
    #[serde(default)]
    lane: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(super) struct SubmitParams {
    pub description: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, alias = "swimLaneId")]
    pub lane: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub auto_start: Option<bool>,
    #[serde(default)]
    pub auto_pilot: Option<bool>,
    #[serde(default)]
    pub auto_close: Option<bool>,
    #[serde(default)]
    pub use_worktree: Option<bool>,
    #[serde(default)]
    pub use_memory: Option<bool>,
    #[serde(default)]
    pub input: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MoveParams {
    id: String,
    column: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateParams {
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    output: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CompleteParams {
    id: String,
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    output: Option<String>,
}

fn default_success() -> bool {
    true
}

impl SubmitParams {
    pub(super) fn into_new_task(self) -> NewTask {
        NewTask {
            description: self.description,
            target_role: self.role.as_deref().map(AgentRole::parse),
            priority: self.priority,
            lane_id: self.lane.map(LaneId::from_string),
            depends_on: self.depends_on.into_iter().map(TaskId::from_string).collect(),
            toggles: Toggles {
                auto_start: self.auto_start,
                auto_pilot: self.auto_pilot,
                auto_close: self.auto_close,
                use_worktree: self.use_worktree,
                use_memory: self.use_memory,
            },
            input: self.input,
            tags: self.tags,
            column: None,
        }
    }
}

pub fn register(table: &mut MethodTable) {
    table.register("task.list", list);
    table.register("task.get", get);
    table.register("task.submit", submit);
    table.register("task.move", move_task);
    table.register("task.cancel", cancel);
    table.register("task.delete", delete);
    table.register("task.update", update);
    table.register("task.complete", complete);
}

async fn list(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: ListParams = params(raw)?;
    let mut tasks = ctx.kanban.list_tasks()?;
    if let Some(lane) = &p.lane {
        tasks.retain(|t| t.lane_id.as_ref().is_some_and(|l| l.as_str() == lane));
    }
    if let Some(status) = &p.status {
        tasks.retain(|t| t.status.to_string() == *status);
    }
    result(&tasks)
}

async fn get(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    result(&ctx.kanban.get_task(&p.id)?)
}

/// Create a task directly into the queue (`todo`) and hand it to the
/// orchestrator for assignment.
async fn submit(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: SubmitParams = params(raw)?;
    let mut new_task = p.into_new_task();
    new_task.column = Some(KanbanColumn::Todo);
    let task = ctx.kanban.create_task(new_task)?;
    ctx.orchestrator.enqueue_task(task.id.clone()).await?;
    result(&ctx.kanban.get_task(task.id.as_str())?)
}

async fn move_task(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: MoveParams = params(raw)?;
    let column = KanbanColumn::parse(&p.column)
        .ok_or_else(|| RpcError::invalid_params(format!("unknown column: {}", p.column)))?;
    let task = ctx.kanban.move_task(&TaskId::from_string(p.id), column)?;
    if column == KanbanColumn::InProgress && !task.status.is_terminal() {
        ctx.orchestrator.enqueue_task(task.id.clone()).await?;
    }
    result(&task)
}

async fn cancel(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    ctx.orchestrator.cancel_task(TaskId::from_string(p.id)).await?;
    Ok(json!({ "cancelled": true }))
}

async fn delete(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let id = TaskId::from_string(p.id);
    ctx.orchestrator.dequeue_task(id.clone()).await?;
    ctx.kanban.delete_task(&id)?;
    Ok(json!({ "deleted": true }))
}

async fn update(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: UpdateParams = params(raw)?;
    let mut task = ctx.kanban.get_task(&p.id)?;
    if let Some(description) = p.description {
        task.description = description;
    }
    if let Some(priority) = p.priority {
        task.priority = priority;
    }
    if let Some(tags) = p.tags {
        task.tags = tags;
    }
    if let Some(output) = p.output {
        task.output = Some(output);
    }
    result(&ctx.kanban.update_task(task)?)
}

/// External completion signal (RPC side of the status-detector hook).
/// The pipeline engine reacts through the `task.completed` bus event, not
/// from here, so completions are counted exactly once.
async fn complete(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: CompleteParams = params(raw)?;
    let id = TaskId::from_string(p.id);
    ctx.orchestrator.complete_task(id.clone(), p.success, p.output).await?;
    result(&ctx.kanban.get_task(id.as_str())?)
}
