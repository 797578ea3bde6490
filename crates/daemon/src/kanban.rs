// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kanban model: swimlanes, tasks, column transitions, and the auto-close
//! sweep.
//!
//! Toggle semantics: lane defaults are stamped onto a task once, at
//! creation, for toggles left unset; the read-time resolver still falls
//! through to the current lane default for anything that remains unset.
//! An explicit `false` on a task is never overridden.

use chrono::Duration as ChronoDuration;
use hq_core::{
    Clock, Event, KanbanColumn, LaneId, SwimLane, Task, TaskId, TaskStatus,
};
use hq_storage::{Store, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::event_bus::EventBus;

/// Kanban errors.
#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("lane not found: {0}")]
    LaneNotFound(String),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task {task} dependency {dependency} does not exist")]
    UnknownDependency { task: String, dependency: String },
    #[error("dependency cycle involving task {0}")]
    DependencyCycle(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("lane {0} still has tasks")]
    LaneNotEmpty(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Inputs to task creation.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub description: String,
    pub target_role: Option<hq_core::AgentRole>,
    pub priority: i32,
    pub lane_id: Option<LaneId>,
    pub depends_on: Vec<TaskId>,
    pub toggles: hq_core::Toggles,
    pub input: Option<serde_json::Value>,
    pub tags: Vec<String>,
    pub column: Option<KanbanColumn>,
}

/// The board: owns lanes and tasks, with transitions centralised here.
pub struct Kanban<C: Clock> {
    store: Arc<dyn Store>,
    bus: EventBus,
    clock: C,
}

impl<C: Clock> Kanban<C> {
    pub fn new(store: Arc<dyn Store>, bus: EventBus, clock: C) -> Self {
        Self { store, bus, clock }
    }

    // -- lanes --

    pub fn create_lane(&self, lane: SwimLane) -> Result<SwimLane, KanbanError> {
        self.store.put_lane(&lane)?;
        self.bus.publish(Event::LaneCreated { id: lane.id.clone() });
        Ok(lane)
    }

    pub fn edit_lane(&self, lane: SwimLane) -> Result<SwimLane, KanbanError> {
        if self.store.get_lane(lane.id.as_str())?.is_none() {
            return Err(KanbanError::LaneNotFound(lane.id.as_str().to_string()));
        }
        self.store.put_lane(&lane)?;
        self.bus.publish(Event::LaneUpdated { id: lane.id.clone() });
        Ok(lane)
    }

    pub fn delete_lane(&self, id: &LaneId) -> Result<(), KanbanError> {
        if self.store.get_lane(id.as_str())?.is_none() {
            return Err(KanbanError::LaneNotFound(id.as_str().to_string()));
        }
        if !self.store.tasks_in_lane(id.as_str())?.is_empty() {
            return Err(KanbanError::LaneNotEmpty(id.as_str().to_string()));
        }
        self.store.delete_lane(id.as_str())?;
        self.bus.publish(Event::LaneDeleted { id: id.clone() });
        Ok(())
    }

    pub fn list_lanes(&self) -> Result<Vec<SwimLane>, KanbanError> {
        let mut lanes = self.store.list_lanes()?;
        lanes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(lanes)
    }

    pub fn get_lane(&self, id: &str) -> Result<SwimLane, KanbanError> {
        self.store.get_lane(id)?.ok_or_else(|| KanbanError::LaneNotFound(id.to_string()))
    }

    // -- tasks --

    /// Create a task. Lane defaults are stamped onto unset toggles here,
    /// once; later lane edits leave the task untouched.
    pub fn create_task(&self, new: NewTask) -> Result<Task, KanbanError> {
        let mut task = Task::new(new.description, self.clock.now_utc());
        task.target_role = new.target_role;
        task.priority = new.priority;
        task.depends_on = new.depends_on;
        task.toggles = new.toggles;
        task.input = new.input;
        task.tags = new.tags;
        task.column = new.column.unwrap_or(KanbanColumn::Backlog);

        if let Some(lane_id) = new.lane_id {
            let lane = self.get_lane(lane_id.as_str())?;
            task.toggles.stamp(&lane.default_toggles);
            task.lane_id = Some(lane_id);
        }

        self.check_dependencies(&task)?;
        self.store.put_task(&task)?;
        self.bus.publish(Event::TaskSubmitted { id: task.id.clone() });
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Task, KanbanError> {
        self.store.get_task(id)?.ok_or_else(|| KanbanError::TaskNotFound(id.to_string()))
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, KanbanError> {
        let mut tasks = self.store.list_tasks()?;
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    /// Update mutable fields of a task (description, priority, tags,
    /// toggles, dependencies). Dependency edits re-run the cycle check.
    pub fn update_task(&self, task: Task) -> Result<Task, KanbanError> {
        if self.store.get_task(task.id.as_str())?.is_none() {
            return Err(KanbanError::TaskNotFound(task.id.as_str().to_string()));
        }
        self.check_dependencies(&task)?;
        self.store.put_task(&task)?;
        Ok(task)
    }

    pub fn delete_task(&self, id: &TaskId) -> Result<(), KanbanError> {
        if !self.store.delete_task(id.as_str())? {
            return Err(KanbanError::TaskNotFound(id.as_str().to_string()));
        }
        Ok(())
    }

    /// Move a task to a column, applying the column↔status coupling:
    /// `done` forces a terminal status, leaving `done` resets to pending,
    /// and the move is idempotent.
    pub fn move_task(&self, id: &TaskId, column: KanbanColumn) -> Result<Task, KanbanError> {
        let mut task = self.get_task(id.as_str())?;
        if task.column == column {
            return Ok(task); // idempotent
        }

        let now = self.clock.now_utc();
        let was_done = task.column == KanbanColumn::Done;
        task.column = column;
        task.updated_at = now;

        match column {
            KanbanColumn::Done => {
                // Completed unless it already failed
                let status = if task.status == TaskStatus::Failed {
                    TaskStatus::Failed
                } else {
                    TaskStatus::Completed
                };
                task.set_status(status, now);
                task.done_at = Some(now);
            }
            _ if was_done => {
                task.set_status(TaskStatus::Pending, now);
                task.assigned_agent_id = None;
                task.done_at = None;
            }
            _ => {}
        }

        self.store.put_task(&task)?;
        self.bus.publish(Event::TaskMoved { id: id.clone(), column });
        Ok(task)
    }

    /// Hand a task to the orchestrator: move to `in_progress` and mark it
    /// pending for assignment. The caller enqueues it with the orchestrator.
    pub fn start_task(&self, id: &TaskId) -> Result<Task, KanbanError> {
        let mut task = self.get_task(id.as_str())?;
        task.column = KanbanColumn::InProgress;
        if task.status.is_terminal() || task.status == TaskStatus::Assigned {
            task.set_status(TaskStatus::Pending, self.clock.now_utc());
            task.assigned_agent_id = None;
        }
        task.updated_at = self.clock.now_utc();
        self.store.put_task(&task)?;
        self.bus.publish(Event::TaskMoved { id: id.clone(), column: KanbanColumn::InProgress });
        Ok(task)
    }

    /// Pull a task back to `todo`, cancelling any assignment. The caller
    /// tells the orchestrator to drop it from the queue.
    pub fn stop_task(&self, id: &TaskId) -> Result<Task, KanbanError> {
        let mut task = self.get_task(id.as_str())?;
        task.column = KanbanColumn::Todo;
        task.assigned_agent_id = None;
        task.set_status(TaskStatus::Pending, self.clock.now_utc());
        self.store.put_task(&task)?;
        self.bus.publish(Event::TaskMoved { id: id.clone(), column: KanbanColumn::Todo });
        Ok(task)
    }

    /// Board snapshot: every column, tasks ordered by priority then age.
    pub fn board(&self) -> Result<HashMap<KanbanColumn, Vec<Task>>, KanbanError> {
        let mut board: HashMap<KanbanColumn, Vec<Task>> =
            KanbanColumn::ALL.iter().map(|c| (*c, Vec::new())).collect();
        for task in self.store.list_tasks()? {
            board.entry(task.column).or_default().push(task);
        }
        for tasks in board.values_mut() {
            tasks.sort_by(|a, b| {
                b.priority.cmp(&a.priority).then(a.created_at.cmp(&b.created_at))
            });
        }
        Ok(board)
    }

    /// Resolve a task's effective toggles against its current lane.
    pub fn effective_toggles(&self, task: &Task) -> Result<hq_core::EffectiveToggles, KanbanError> {
        let lane = match &task.lane_id {
            Some(id) => self.store.get_lane(id.as_str())?,
            None => None,
        };
        Ok(task.toggles.effective(lane.as_ref().map(|l| &l.default_toggles)))
    }

    /// Find done tasks with effective `autoClose` whose grace window has
    /// elapsed, mark them archived, and return the agents to kill.
    pub fn sweep_auto_close(
        &self,
        grace: Duration,
    ) -> Result<Vec<(TaskId, Option<hq_core::AgentId>)>, KanbanError> {
        let cutoff = self.clock.now_utc()
            - ChronoDuration::from_std(grace).unwrap_or(ChronoDuration::zero());
        let mut swept = Vec::new();

        for mut task in self.store.list_tasks()? {
            if task.column != KanbanColumn::Done
                || task.tags.iter().any(|t| t == "archived")
            {
                continue;
            }
            let Some(done_at) = task.done_at else { continue };
            if done_at > cutoff {
                continue;
            }
            if !self.effective_toggles(&task)?.auto_close {
                continue;
            }

            task.tags.push("archived".to_string());
            let agent = task.assigned_agent_id.clone();
            task.assigned_agent_id = None;
            task.updated_at = self.clock.now_utc();
            self.store.put_task(&task)?;
            info!(task = %task.id, "auto-closed task archived");
            swept.push((task.id.clone(), agent));
        }
        Ok(swept)
    }

    /// Reject dependency edits that would leave the graph cyclic or
    /// dangling. The check runs on insert and on update.
    fn check_dependencies(&self, task: &Task) -> Result<(), KanbanError> {
        if task.depends_on.is_empty() {
            return Ok(());
        }

        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        for existing in self.store.list_tasks()? {
            edges.insert(
                existing.id.as_str().to_string(),
                existing.depends_on.iter().map(|d| d.as_str().to_string()).collect(),
            );
        }
        for dep in &task.depends_on {
            if dep != &task.id && !edges.contains_key(dep.as_str()) {
                return Err(KanbanError::UnknownDependency {
                    task: task.id.as_str().to_string(),
                    dependency: dep.as_str().to_string(),
                });
            }
        }
        edges.insert(
            task.id.as_str().to_string(),
            task.depends_on.iter().map(|d| d.as_str().to_string()).collect(),
        );

        // DFS from the edited task; revisiting it means a cycle
        let mut visiting = HashSet::new();
        let mut visited = HashSet::new();
        if has_cycle(task.id.as_str(), &edges, &mut visiting, &mut visited) {
            return Err(KanbanError::DependencyCycle(task.id.as_str().to_string()));
        }
        Ok(())
    }
}

fn has_cycle(
    node: &str,
    edges: &HashMap<String, Vec<String>>,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
) -> bool {
    if visited.contains(node) {
        return false;
    }
    if !visiting.insert(node.to_string()) {
        return true;
    }
    if let Some(deps) = edges.get(node) {
        for dep in deps {
            if has_cycle(dep, edges, visiting, visited) {
                return true;
            }
        }
    }
    visiting.remove(node);
    visited.insert(node.to_string());
    false
}

#[cfg(test)]
#[path = "kanban_tests.rs"]
mod tests;
