// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The row-store interface and its file-backed implementation.
//!
//! Every call is a self-contained transaction: mutations take the state
//! lock, apply, persist, and release. Callers never observe a partially
//! applied write.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::StoreState;
use hq_core::{AgentInstance, Pipeline, PipelineRun, RunStatus, SwimLane, Task, Team};
use parking_lot::Mutex;
use std::path::PathBuf;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Narrow row-store contract: row-level CRUD plus a few indexed queries.
///
/// Implementations must be safe to call from multiple tasks; each call is
/// an isolated transaction.
pub trait Store: Send + Sync + 'static {
    // -- agents --
    fn put_agent(&self, agent: &AgentInstance) -> Result<(), StoreError>;
    fn get_agent(&self, id: &str) -> Result<Option<AgentInstance>, StoreError>;
    fn delete_agent(&self, id: &str) -> Result<bool, StoreError>;
    fn list_agents(&self) -> Result<Vec<AgentInstance>, StoreError>;
    /// Agents whose state is not terminal (reconciler working set).
    fn non_terminal_agents(&self) -> Result<Vec<AgentInstance>, StoreError>;

    // -- tasks --
    fn put_task(&self, task: &Task) -> Result<(), StoreError>;
    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError>;
    fn delete_task(&self, id: &str) -> Result<bool, StoreError>;
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
    fn tasks_in_lane(&self, lane_id: &str) -> Result<Vec<Task>, StoreError>;
    fn tasks_for_run(&self, run_id: &str) -> Result<Vec<Task>, StoreError>;

    // -- lanes --
    fn put_lane(&self, lane: &SwimLane) -> Result<(), StoreError>;
    fn get_lane(&self, id: &str) -> Result<Option<SwimLane>, StoreError>;
    fn delete_lane(&self, id: &str) -> Result<bool, StoreError>;
    fn list_lanes(&self) -> Result<Vec<SwimLane>, StoreError>;

    // -- teams --
    fn put_team(&self, team: &Team) -> Result<(), StoreError>;
    fn get_team(&self, id: &str) -> Result<Option<Team>, StoreError>;
    fn delete_team(&self, id: &str) -> Result<bool, StoreError>;
    fn list_teams(&self) -> Result<Vec<Team>, StoreError>;

    // -- pipelines --
    fn put_pipeline(&self, pipeline: &Pipeline) -> Result<(), StoreError>;
    fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, StoreError>;
    fn list_pipelines(&self) -> Result<Vec<Pipeline>, StoreError>;

    // -- pipeline runs --
    fn put_run(&self, run: &PipelineRun) -> Result<(), StoreError>;
    fn get_run(&self, id: &str) -> Result<Option<PipelineRun>, StoreError>;
    fn list_runs(&self) -> Result<Vec<PipelineRun>, StoreError>;
    fn active_runs(&self) -> Result<Vec<PipelineRun>, StoreError>;
}

/// File-backed store: in-memory rows, snapshot persisted on every mutation.
pub struct FileStore {
    state: Mutex<Inner>,
    path: Option<PathBuf>,
}

struct Inner {
    rows: StoreState,
    generation: u64,
}

impl FileStore {
    /// Open a store backed by a snapshot file, loading existing rows.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let (rows, generation) = match Snapshot::load(&path)? {
            Some(snapshot) => (snapshot.state, snapshot.generation),
            None => (StoreState::default(), 0),
        };
        Ok(Self { state: Mutex::new(Inner { rows, generation }), path: Some(path) })
    }

    /// Volatile store for tests and ephemeral daemons.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(Inner { rows: StoreState::default(), generation: 0 }),
            path: None,
        }
    }

    /// Run a mutation under the lock, then persist.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T, StoreError> {
        let mut inner = self.state.lock();
        let out = f(&mut inner.rows);
        if let Some(path) = &self.path {
            inner.generation += 1;
            Snapshot::new(inner.generation, inner.rows.clone()).save(path)?;
        }
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> T {
        f(&self.state.lock().rows)
    }
}

impl Store for FileStore {
    fn put_agent(&self, agent: &AgentInstance) -> Result<(), StoreError> {
        let agent = agent.clone();
        self.mutate(|s| {
            s.agents.insert(agent.id.as_str().to_string(), agent);
        })
    }

    fn get_agent(&self, id: &str) -> Result<Option<AgentInstance>, StoreError> {
        Ok(self.read(|s| s.agents.get(id).cloned()))
    }

    fn delete_agent(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|s| s.agents.remove(id).is_some())
    }

    fn list_agents(&self) -> Result<Vec<AgentInstance>, StoreError> {
        Ok(self.read(|s| s.agents.values().cloned().collect()))
    }

    fn non_terminal_agents(&self) -> Result<Vec<AgentInstance>, StoreError> {
        Ok(self.read(|s| {
            s.agents.values().filter(|a| !a.state.is_terminal()).cloned().collect()
        }))
    }

    fn put_task(&self, task: &Task) -> Result<(), StoreError> {
        let task = task.clone();
        self.mutate(|s| {
            s.tasks.insert(task.id.as_str().to_string(), task);
        })
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.read(|s| s.tasks.get(id).cloned()))
    }

    fn delete_task(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|s| s.tasks.remove(id).is_some())
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        Ok(self.read(|s| s.tasks.values().cloned().collect()))
    }

    fn tasks_in_lane(&self, lane_id: &str) -> Result<Vec<Task>, StoreError> {
        Ok(self.read(|s| {
            s.tasks
                .values()
                .filter(|t| t.lane_id.as_ref().is_some_and(|l| l.as_str() == lane_id))
                .cloned()
                .collect()
        }))
    }

    fn tasks_for_run(&self, run_id: &str) -> Result<Vec<Task>, StoreError> {
        Ok(self.read(|s| {
            s.tasks
                .values()
                .filter(|t| t.stage_ref.as_ref().is_some_and(|r| r.run_id.as_str() == run_id))
                .cloned()
                .collect()
        }))
    }

    fn put_lane(&self, lane: &SwimLane) -> Result<(), StoreError> {
        let lane = lane.clone();
        self.mutate(|s| {
            s.lanes.insert(lane.id.as_str().to_string(), lane);
        })
    }

    fn get_lane(&self, id: &str) -> Result<Option<SwimLane>, StoreError> {
        Ok(self.read(|s| s.lanes.get(id).cloned()))
    }

    fn delete_lane(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|s| s.lanes.remove(id).is_some())
    }

    fn list_lanes(&self) -> Result<Vec<SwimLane>, StoreError> {
        Ok(self.read(|s| s.lanes.values().cloned().collect()))
    }

    fn put_team(&self, team: &Team) -> Result<(), StoreError> {
        let team = team.clone();
        self.mutate(|s| {
            s.teams.insert(team.id.as_str().to_string(), team);
        })
    }

    fn get_team(&self, id: &str) -> Result<Option<Team>, StoreError> {
        Ok(self.read(|s| s.teams.get(id).cloned()))
    }

    fn delete_team(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|s| s.teams.remove(id).is_some())
    }

    fn list_teams(&self) -> Result<Vec<Team>, StoreError> {
        Ok(self.read(|s| s.teams.values().cloned().collect()))
    }

    fn put_pipeline(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        let pipeline = pipeline.clone();
        self.mutate(|s| {
            s.pipelines.insert(pipeline.id.as_str().to_string(), pipeline);
        })
    }

    fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, StoreError> {
        Ok(self.read(|s| s.pipelines.get(id).cloned()))
    }

    fn list_pipelines(&self) -> Result<Vec<Pipeline>, StoreError> {
        Ok(self.read(|s| s.pipelines.values().cloned().collect()))
    }

    fn put_run(&self, run: &PipelineRun) -> Result<(), StoreError> {
        let run = run.clone();
        self.mutate(|s| {
            s.runs.insert(run.id.as_str().to_string(), run);
        })
    }

    fn get_run(&self, id: &str) -> Result<Option<PipelineRun>, StoreError> {
        Ok(self.read(|s| s.runs.get(id).cloned()))
    }

    fn list_runs(&self) -> Result<Vec<PipelineRun>, StoreError> {
        Ok(self.read(|s| s.runs.values().cloned().collect()))
    }

    fn active_runs(&self) -> Result<Vec<PipelineRun>, StoreError> {
        Ok(self.read(|s| {
            s.runs
                .values()
                .filter(|r| matches!(r.status, RunStatus::Running | RunStatus::Paused))
                .cloned()
                .collect()
        }))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
