// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pipeline.*` methods.

use hq_core::{AgentRole, Stage, StageType};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StageParams {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    stage_type: StageType,
    agent_role: String,
    task_description: String,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    fan_out_count: Option<u32>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl From<StageParams> for Stage {
    fn from(p: StageParams) -> Self {
        Stage {
            name: p.name.unwrap_or_else(|| p.id.clone()),
            id: p.id,
            stage_type: p.stage_type,
            agent_role: AgentRole::parse(&p.agent_role),
            task_description: p.task_description,
            depends_on: p.depends_on,
            condition: p.condition,
            fan_out_count: p.fan_out_count,
            timeout_secs: p.timeout_secs,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateParams {
    name: String,
    stages: Vec<StageParams>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunParams {
    run: String,
}

pub fn register(table: &mut MethodTable) {
    table.register("pipeline.list", list);
    table.register("pipeline.create", create);
    table.register("pipeline.run", run);
    table.register("pipeline.getStatus", get_status);
    table.register("pipeline.getActive", get_active);
    table.register("pipeline.pause", pause);
    table.register("pipeline.resume", resume);
    table.register("pipeline.cancel", cancel);
}

async fn list(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    result(&ctx.engine.list_pipelines()?)
}

async fn create(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: CreateParams = params(raw)?;
    let stages = p.stages.into_iter().map(Stage::from).collect();
    result(&ctx.engine.create_pipeline(p.name, stages)?)
}

async fn run(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    result(&ctx.engine.start_run(&p.id).await?)
}

async fn get_status(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: RunParams = params(raw)?;
    result(&ctx.engine.get_run(&p.run)?)
}

async fn get_active(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    result(&ctx.engine.active_runs()?)
}

async fn pause(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: RunParams = params(raw)?;
    result(&ctx.engine.pause(&p.run)?)
}

async fn resume(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: RunParams = params(raw)?;
    result(&ctx.engine.resume(&p.run).await?)
}

async fn cancel(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: RunParams = params(raw)?;
    result(&ctx.engine.cancel(&p.run).await?)
}
