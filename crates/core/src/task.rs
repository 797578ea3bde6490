// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kanban tasks and tri-state behaviour toggles.
//!
//! A toggle left unset on a task falls through to the owning lane's default
//! at read time; an explicit `false` is never overridden by a lane default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::agent::{AgentProvider, AgentRole};
use crate::id::{AgentId, LaneId, RunId, TaskId};
use crate::lane::LaneToggles;

/// Queue/assignment status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Assigned => "assigned",
        InProgress => "in_progress",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Board column a task sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanbanColumn {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
}

impl KanbanColumn {
    pub const ALL: [KanbanColumn; 5] = [
        KanbanColumn::Backlog,
        KanbanColumn::Todo,
        KanbanColumn::InProgress,
        KanbanColumn::InReview,
        KanbanColumn::Done,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(KanbanColumn::Backlog),
            "todo" => Some(KanbanColumn::Todo),
            "in_progress" => Some(KanbanColumn::InProgress),
            "in_review" => Some(KanbanColumn::InReview),
            "done" => Some(KanbanColumn::Done),
            _ => None,
        }
    }
}

crate::simple_display! {
    KanbanColumn {
        Backlog => "backlog",
        Todo => "todo",
        InProgress => "in_progress",
        InReview => "in_review",
        Done => "done",
    }
}

/// Per-task tri-state toggles (`None` = unset, falls through to the lane).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toggles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_pilot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_worktree: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_memory: Option<bool>,
}

impl Toggles {
    /// Copy lane defaults onto toggles left unset. Runs once, at task
    /// creation; later lane edits do not mutate already-stamped tasks.
    pub fn stamp(&mut self, lane: &LaneToggles) {
        self.auto_start.get_or_insert(lane.auto_start);
        self.auto_pilot.get_or_insert(lane.auto_pilot);
        self.auto_close.get_or_insert(lane.auto_close);
        self.use_worktree.get_or_insert(lane.use_worktree);
        self.use_memory.get_or_insert(lane.use_memory);
    }

    /// Resolve one toggle: task value if set, else the lane default, else false.
    fn resolve(task: Option<bool>, lane: Option<bool>) -> bool {
        task.or(lane).unwrap_or(false)
    }

    /// Resolve every toggle against the (current) owning lane's defaults.
    pub fn effective(&self, lane: Option<&LaneToggles>) -> EffectiveToggles {
        EffectiveToggles {
            auto_start: Self::resolve(self.auto_start, lane.map(|l| l.auto_start)),
            auto_pilot: Self::resolve(self.auto_pilot, lane.map(|l| l.auto_pilot)),
            auto_close: Self::resolve(self.auto_close, lane.map(|l| l.auto_close)),
            use_worktree: Self::resolve(self.use_worktree, lane.map(|l| l.use_worktree)),
            use_memory: Self::resolve(self.use_memory, lane.map(|l| l.use_memory)),
        }
    }
}

/// Fully-resolved toggle values for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveToggles {
    pub auto_start: bool,
    pub auto_pilot: bool,
    pub auto_close: bool,
    pub use_worktree: bool,
    pub use_memory: bool,
}

/// One status transition, kept in the task's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Freeform comment attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskComment {
    pub author: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Link from a task back to the pipeline run/stage that materialised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRef {
    pub run_id: RunId,
    pub stage_id: String,
    /// Sibling index for fan-out stages (0-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<u32>,
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_role: Option<AgentRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent_id: Option<AgentId>,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub column: KanbanColumn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane_id: Option<LaneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtask_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskId>,
    #[serde(default)]
    pub toggles: Toggles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Runtime override: spawn the handling agent here instead of the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir_override: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_ref: Option<StageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<StatusChange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<TaskComment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a pending backlog task with defaults.
    pub fn new(description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            description: description.into(),
            target_role: None,
            assigned_agent_id: None,
            status: TaskStatus::Pending,
            priority: 0,
            input: None,
            output: None,
            column: KanbanColumn::Backlog,
            lane_id: None,
            parent_task_id: None,
            subtask_ids: Vec::new(),
            depends_on: Vec::new(),
            toggles: Toggles::default(),
            provider: None,
            model: None,
            runtime_override: None,
            working_dir_override: None,
            stage_ref: None,
            status_history: Vec::new(),
            comments: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            done_at: None,
        }
    }

    /// Record a status transition (and its history entry).
    pub fn set_status(&mut self, to: TaskStatus, now: DateTime<Utc>) {
        if self.status == to {
            return;
        }
        self.status_history.push(StatusChange { from: self.status, to, at: now });
        self.status = to;
        self.updated_at = now;
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
