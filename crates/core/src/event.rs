// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events broadcast on the daemon's event bus.
//!
//! Internally events are a typed enum; externally (socket, WebSocket, SSE)
//! they travel as a `{name, payload, ts}` envelope where `name` is the
//! dotted topic string (`agent.spawned`, `task.moved`, …).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agent::AgentState;
use crate::id::{AgentId, LaneId, RunId, TaskId};
use crate::pipeline::{RunStatus, StageStatus};
use crate::task::{KanbanColumn, TaskStatus};

/// Events that announce state changes to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- agent --
    #[serde(rename = "agent:spawned")]
    AgentSpawned { id: AgentId, role: String, runtime_id: String },

    #[serde(rename = "agent:state-changed")]
    AgentStateChanged { id: AgentId, from: AgentState, to: AgentState },

    #[serde(rename = "agent:terminated")]
    AgentTerminated { id: AgentId },

    #[serde(rename = "agent:reconnected")]
    AgentReconnected { id: AgentId },

    #[serde(rename = "agent:output")]
    AgentOutput { id: AgentId, output: String },

    // -- task --
    #[serde(rename = "task:submitted")]
    TaskSubmitted { id: TaskId },

    #[serde(rename = "task:assigned")]
    TaskAssigned { id: TaskId, agent_id: AgentId },

    #[serde(rename = "task:moved")]
    TaskMoved { id: TaskId, column: KanbanColumn },

    #[serde(rename = "task:completed")]
    TaskCompleted { id: TaskId, status: TaskStatus },

    #[serde(rename = "task:cancelled")]
    TaskCancelled { id: TaskId },

    // -- kanban lanes --
    #[serde(rename = "lane:created")]
    LaneCreated { id: LaneId },

    #[serde(rename = "lane:updated")]
    LaneUpdated { id: LaneId },

    #[serde(rename = "lane:deleted")]
    LaneDeleted { id: LaneId },

    // -- pipeline --
    #[serde(rename = "pipeline:run-started")]
    PipelineRunStarted { run_id: RunId },

    #[serde(rename = "pipeline:stage-started")]
    PipelineStageStarted { run_id: RunId, stage_id: String },

    #[serde(rename = "pipeline:stage-completed")]
    PipelineStageCompleted { run_id: RunId, stage_id: String, status: StageStatus },

    #[serde(rename = "pipeline:run-finished")]
    PipelineRunFinished { run_id: RunId, status: RunStatus },

    // -- runtime --
    #[serde(rename = "runtime:health-changed")]
    RuntimeHealthChanged { runtime_id: String, healthy: bool },

    // -- daemon --
    #[serde(rename = "daemon:reloaded")]
    DaemonReloaded,

    #[serde(rename = "daemon:shutdown")]
    DaemonShutdown,
}

impl Event {
    /// Dotted topic name used for subscription matching and the wire envelope.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AgentSpawned { .. } => "agent.spawned",
            Event::AgentStateChanged { .. } => "agent.state-changed",
            Event::AgentTerminated { .. } => "agent.terminated",
            Event::AgentReconnected { .. } => "agent.reconnected",
            Event::AgentOutput { .. } => "agent.output",
            Event::TaskSubmitted { .. } => "task.submitted",
            Event::TaskAssigned { .. } => "task.assigned",
            Event::TaskMoved { .. } => "task.moved",
            Event::TaskCompleted { .. } => "task.completed",
            Event::TaskCancelled { .. } => "task.cancelled",
            Event::LaneCreated { .. } => "lane.created",
            Event::LaneUpdated { .. } => "lane.updated",
            Event::LaneDeleted { .. } => "lane.deleted",
            Event::PipelineRunStarted { .. } => "pipeline.run.started",
            Event::PipelineStageStarted { .. } => "pipeline.stage.started",
            Event::PipelineStageCompleted { .. } => "pipeline.stage.completed",
            Event::PipelineRunFinished { .. } => "pipeline.run.finished",
            Event::RuntimeHealthChanged { .. } => "runtime.health-changed",
            Event::DaemonReloaded => "daemon.reloaded",
            Event::DaemonShutdown => "daemon.shutdown",
        }
    }

    /// The entity this event concerns, when there is exactly one.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Event::AgentSpawned { id, .. }
            | Event::AgentStateChanged { id, .. }
            | Event::AgentTerminated { id }
            | Event::AgentReconnected { id }
            | Event::AgentOutput { id, .. } => Some(id.as_str()),
            Event::TaskSubmitted { id }
            | Event::TaskAssigned { id, .. }
            | Event::TaskMoved { id, .. }
            | Event::TaskCompleted { id, .. }
            | Event::TaskCancelled { id } => Some(id.as_str()),
            Event::LaneCreated { id } | Event::LaneUpdated { id } | Event::LaneDeleted { id } => {
                Some(id.as_str())
            }
            Event::PipelineRunStarted { run_id }
            | Event::PipelineStageStarted { run_id, .. }
            | Event::PipelineStageCompleted { run_id, .. }
            | Event::PipelineRunFinished { run_id, .. } => Some(run_id.as_str()),
            Event::RuntimeHealthChanged { runtime_id, .. } => Some(runtime_id),
            Event::DaemonReloaded | Event::DaemonShutdown => None,
        }
    }

    /// Event payload as a JSON object (the envelope's `payload` field).
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                Value::Object(map)
            }
            _ => json!({}),
        }
    }
}

/// Envelope delivered to external subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub name: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl WireEvent {
    pub fn from_event(event: &Event, ts: DateTime<Utc>) -> Self {
        Self { name: event.name().to_string(), payload: event.payload(), ts }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
