// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State reconciliation after daemon restart.
//!
//! Runs once at worker start, before the transports accept external RPC:
//! every persisted non-terminal agent is checked against its runtime and
//! either reconnected into the registry or declared lost. Idempotent —
//! a second sweep over the resulting state changes nothing.

use hq_core::{AgentState, TaskStatus};
use hq_adapters::RuntimeManager;
use hq_storage::{Store, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::orchestrator::OrchestratorHandle;

/// Outcome summary, logged and returned from `daemon.health` on request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileSummary {
    pub total: usize,
    pub reconnected: usize,
    pub lost: usize,
    pub errors: Vec<String>,
}

/// Sweep persisted agents against live runtime state.
pub async fn reconcile(
    store: &Arc<dyn Store>,
    runtimes: &Arc<RuntimeManager>,
    orchestrator: &OrchestratorHandle,
) -> Result<ReconcileSummary, StoreError> {
    let agents = store.non_terminal_agents()?;
    let mut summary = ReconcileSummary { total: agents.len(), ..Default::default() };

    if !agents.is_empty() {
        info!(count = agents.len(), "reconciling persisted agents");
    }

    for mut agent in agents {
        let Some(adapter) = runtimes.get(&agent.runtime_id) else {
            summary.lost += 1;
            summary
                .errors
                .push(format!("{}: runtime {} no longer configured", agent.id, agent.runtime_id));
            mark_lost(store, orchestrator, &mut agent, "runtime no longer configured").await?;
            continue;
        };

        let alive = tokio::time::timeout(
            hq_adapters::DEFAULT_DEADLINE,
            adapter.is_alive(&agent.location),
        )
        .await
        .unwrap_or(false);

        if alive {
            let was_error = agent.state == AgentState::Error;
            agent.state = AgentState::Idle;
            agent.current_task_id = None;
            if was_error {
                agent.error_message = None;
            }
            store.put_agent(&agent)?;
            if let Err(e) = orchestrator.reconnect(agent.clone()).await {
                warn!(agent = %agent.id, error = %e, "re-registration failed");
                summary.errors.push(format!("{}: {e}", agent.id));
                continue;
            }
            info!(agent = %agent.id, location = %agent.location, "agent reconnected");
            summary.reconnected += 1;
        } else {
            summary.lost += 1;
            info!(agent = %agent.id, location = %agent.location, "agent lost while daemon was down");
            mark_lost(store, orchestrator, &mut agent, "lost during reconciliation").await?;
        }
    }

    info!(
        total = summary.total,
        reconnected = summary.reconnected,
        lost = summary.lost,
        errors = summary.errors.len(),
        "reconciliation complete"
    );
    Ok(summary)
}

/// Mark an agent lost: error state, and its in-flight task (if any) back
/// to pending so another agent can pick it up.
async fn mark_lost(
    store: &Arc<dyn Store>,
    orchestrator: &OrchestratorHandle,
    agent: &mut hq_core::AgentInstance,
    reason: &str,
) -> Result<(), StoreError> {
    if let Some(task_id) = agent.current_task_id.clone() {
        if let Some(mut task) = store.get_task(task_id.as_str())? {
            if !task.status.is_terminal() {
                task.assigned_agent_id = None;
                task.set_status(TaskStatus::Pending, chrono::Utc::now());
                store.put_task(&task)?;
            }
        }
    }

    agent.mark_error(reason, chrono::Utc::now());
    store.put_agent(agent)?;
    // Register the errored agent so queries see it; reconnect does not
    // publish agent.reconnected for error-state agents.
    if let Err(e) = orchestrator
        .mark_lost_registration(agent.clone())
        .await
    {
        warn!(agent = %agent.id, error = %e, "lost-agent registration failed");
    }
    Ok(())
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
