// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `daemon.*` methods.

use hq_core::{AgentState, Event, TaskStatus};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::health::{ComponentHealth, HealthSnapshot, StatsSnapshot};
use crate::orchestrator::AgentFilter;
use crate::rpc::{result, MethodTable, RpcContext, RpcError};

pub fn register(table: &mut MethodTable) {
    table.register("daemon.health", health);
    table.register("daemon.config", config);
    table.register("daemon.reload", reload);
    table.register("daemon.stats", stats);
    table.register("daemon.shutdown", shutdown);
}

/// Build the health snapshot (shared with the HTTP `/health` endpoint).
pub fn health_snapshot(ctx: &RpcContext) -> Result<HealthSnapshot, RpcError> {
    let agents = ctx.orchestrator.list_agents(&AgentFilter::default());
    let tasks = ctx.store.list_tasks()?;
    let components = ComponentHealth {
        store: "ok",
        event_bus_subscribers: ctx.bus.subscriber_count(),
        agents: agents.len(),
        tasks: tasks.len(),
        active_runs: ctx.store.active_runs()?.len(),
    };
    Ok(HealthSnapshot::build(
        ctx.uptime_secs(),
        components,
        ctx.runtimes.health_snapshot(),
    ))
}

async fn health(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    result(&health_snapshot(&ctx)?)
}

async fn config(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    result(&ctx.config)
}

/// The worker's side of reload: announce it. The supervisor re-reads the
/// config file on SIGHUP and forwards the signal here.
async fn reload(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    ctx.bus.publish(Event::DaemonReloaded);
    Ok(json!({ "reloaded": true }))
}

async fn stats(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let agents = ctx.orchestrator.list_agents(&AgentFilter::default());
    let tasks = ctx.store.list_tasks()?;
    let snapshot = StatsSnapshot {
        uptime_secs: ctx.uptime_secs(),
        events_published: ctx.bus.published_count(),
        agents_total: agents.len(),
        agents_working: agents.iter().filter(|a| a.state == AgentState::Working).count(),
        tasks_total: tasks.len(),
        tasks_done: tasks.iter().filter(|t| t.status == TaskStatus::Completed).count(),
        lanes: ctx.store.list_lanes()?.len(),
        teams: ctx.store.list_teams()?.len(),
        pipelines: ctx.store.list_pipelines()?.len(),
        runs_active: ctx.store.active_runs()?.len(),
    };
    result(&snapshot)
}

async fn shutdown(_raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    ctx.bus.publish(Event::DaemonShutdown);
    ctx.shutdown.notify_one();
    Ok(json!({ "shuttingDown": true }))
}
