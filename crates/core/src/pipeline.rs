// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline definitions and runs.
//!
//! A pipeline is a DAG of stages; a run materialises stages into tasks as
//! their dependencies complete. Pipelines are immutable once a run
//! references them — edits produce a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::agent::AgentRole;
use crate::id::{AgentId, PipelineId, RunId};

/// Execution shape of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    /// Exactly one task; dependants wait for it.
    Sequential,
    /// Exactly one task; no ordering beyond `depends_on`.
    Parallel,
    /// Task created only if `condition` matches predecessor output.
    Conditional,
    /// `fan_out_count` sibling tasks; completes when all do.
    FanOut,
}

crate::simple_display! {
    StageType {
        Sequential => "sequential",
        Parallel => "parallel",
        Conditional => "conditional",
        FanOut => "fan_out",
    }
}

/// One node of the pipeline DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Stage ID, unique within the pipeline.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub agent_role: AgentRole,
    pub task_description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Substring matched against predecessor output (conditional stages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fan_out_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Validation failures for a pipeline definition.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("pipeline has no stages")]
    Empty,
    #[error("duplicate stage id: {0}")]
    DuplicateStage(String),
    #[error("stage {stage} depends on unknown stage {dependency}")]
    UnknownDependency { stage: String, dependency: String },
    #[error("dependency cycle involving stage {0}")]
    Cycle(String),
    #[error("fan_out stage {0} requires fanOutCount >= 1")]
    BadFanOut(String),
    #[error("conditional stage {0} requires a condition")]
    MissingCondition(String),
}

/// A DAG of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: PipelineId,
    pub name: String,
    pub stages: Vec<Stage>,
    /// Bumped whenever an edit would mutate a run-referenced pipeline.
    #[serde(default = "default_version")]
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    1
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>, now: DateTime<Utc>) -> Self {
        Self { id: PipelineId::new(), name: name.into(), stages, version: 1, created_at: now }
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Validate stage IDs, dependency references, acyclicity, and
    /// per-type requirements.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let mut ids = HashSet::new();
        for stage in &self.stages {
            if !ids.insert(stage.id.as_str()) {
                return Err(PipelineError::DuplicateStage(stage.id.clone()));
            }
        }

        for stage in &self.stages {
            for dep in &stage.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(PipelineError::UnknownDependency {
                        stage: stage.id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
            match stage.stage_type {
                StageType::FanOut if stage.fan_out_count.unwrap_or(0) == 0 => {
                    return Err(PipelineError::BadFanOut(stage.id.clone()));
                }
                StageType::Conditional if stage.condition.is_none() => {
                    return Err(PipelineError::MissingCondition(stage.id.clone()));
                }
                _ => {}
            }
        }

        // Kahn's algorithm; leftover nodes mean a cycle.
        let mut in_degree: HashMap<&str, usize> =
            self.stages.iter().map(|s| (s.id.as_str(), s.depends_on.len())).collect();
        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0;
        while let Some(id) = ready.pop() {
            visited += 1;
            for stage in &self.stages {
                let occurrences = stage.depends_on.iter().filter(|d| *d == id).count();
                if occurrences > 0 {
                    let degree = in_degree.entry(stage.id.as_str()).or_default();
                    *degree = degree.saturating_sub(occurrences);
                    if *degree == 0 {
                        ready.push(stage.id.as_str());
                    }
                }
            }
        }
        if visited != self.stages.len() {
            let stuck = in_degree
                .iter()
                .find(|(_, d)| **d > 0)
                .map(|(id, _)| id.to_string())
                .unwrap_or_default();
            return Err(PipelineError::Cycle(stuck));
        }

        Ok(())
    }
}

/// State of a run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Draft,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

crate::simple_display! {
    RunStatus {
        Draft => "draft",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// State of a single stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Conditional stage whose condition did not match. Counts as
    /// satisfied for downstream dependency resolution.
    Skipped,
}

impl StageStatus {
    /// Whether downstream stages may treat this stage as done.
    pub fn satisfies_dependency(&self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }
}

crate::simple_display! {
    StageStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Per-stage outcome within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Completed sibling count for fan-out stages.
    #[serde(default)]
    pub branches_done: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StageResult {
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            agent_id: None,
            output: None,
            branches_done: 0,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// One execution of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: RunId,
    pub pipeline_id: PipelineId,
    /// Version of the pipeline this run executes.
    pub pipeline_version: u32,
    pub status: RunStatus,
    #[serde(default)]
    pub stage_results: HashMap<String, StageResult>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(pipeline: &Pipeline, now: DateTime<Utc>) -> Self {
        let stage_results =
            pipeline.stages.iter().map(|s| (s.id.clone(), StageResult::pending())).collect();
        Self {
            id: RunId::new(),
            pipeline_id: pipeline.id.clone(),
            pipeline_version: pipeline.version,
            status: RunStatus::Draft,
            stage_results,
            started_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
