// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory row state persisted through snapshots.

use hq_core::{AgentInstance, Pipeline, PipelineRun, SwimLane, Task, Team};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All persisted rows, keyed by entity ID.
///
/// Each map is owned by exactly one daemon component (orchestrator: agents
/// and teams; kanban: lanes and tasks; pipeline engine: pipelines and runs);
/// the store itself is policy-free.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub agents: HashMap<String, AgentInstance>,
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
    #[serde(default)]
    pub lanes: HashMap<String, SwimLane>,
    #[serde(default)]
    pub teams: HashMap<String, Team>,
    #[serde(default)]
    pub pipelines: HashMap<String, Pipeline>,
    #[serde(default)]
    pub runs: HashMap<String, PipelineRun>,
}

impl StoreState {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
            && self.tasks.is_empty()
            && self.lanes.is_empty()
            && self.teams.is_empty()
            && self.pipelines.is_empty()
            && self.runs.is_empty()
    }
}
