// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runtime.*` methods.

use hq_core::RuntimeConfig;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rpc::{params, MethodTable, RpcContext, RpcError};

// No deny_unknown_fields here: the runtime config is flattened in and
// carries type-specific keys.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddParams {
    id: String,
    #[serde(flatten)]
    config: RuntimeConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IdParams {
    id: String,
}

pub fn register(table: &mut MethodTable) {
    table.register("runtime.list", list);
    table.register("runtime.add", add);
    table.register("runtime.remove", remove);
    table.register("runtime.ping", ping);
}

async fn list(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let health = ctx.runtimes.health_snapshot();
    let default_id = ctx.runtimes.default_id().map(str::to_string);
    let runtimes: Vec<Value> = ctx
        .runtimes
        .ids()
        .into_iter()
        .filter_map(|id| ctx.runtimes.get(&id).map(|adapter| (id, adapter)))
        .map(|(id, adapter)| {
            json!({
                "id": id,
                "type": adapter.kind(),
                "default": default_id.as_deref() == Some(id.as_str()),
                "server": ctx.config.server_identity(&id),
                "health": health.get(&id),
            })
        })
        .collect();
    Ok(Value::Array(runtimes))
}

/// Register a runtime for this daemon's lifetime. Persisting it requires a
/// config file edit; the handler says so in the result.
async fn add(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: AddParams = params(raw)?;
    ctx.runtimes.add(&p.id, &p.config);
    Ok(json!({ "added": p.id, "persisted": false }))
}

async fn remove(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    // Refuse while agents still live there
    let busy = ctx
        .orchestrator
        .list_agents(&crate::orchestrator::AgentFilter {
            runtime: Some(p.id.clone()),
            ..Default::default()
        })
        .into_iter()
        .any(|a| !a.state.is_terminal());
    if busy {
        return Err(RpcError::internal(format!("runtime {} still has live agents", p.id)));
    }
    if !ctx.runtimes.remove(&p.id) {
        return Err(RpcError::internal(format!("runtime not found: {}", p.id)));
    }
    Ok(json!({ "removed": p.id }))
}

async fn ping(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: IdParams = params(raw)?;
    let (report, latency_ms) = ctx.runtimes.ping(&p.id).await?;
    Ok(json!({
        "ok": report.status.is_healthy(),
        "status": report.status,
        "latency": latency_ms,
    }))
}
