// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent templates, instances, and runtime locations.
//!
//! A template is pure configuration; an instance is one running AI CLI
//! process bound to exactly one location on one runtime. Instances are
//! owned by the orchestrator; all other components reference them by ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::id::{AgentId, TaskId, TeamId};

/// Role an agent plays when matched against tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Coder,
    Reviewer,
    Tester,
    Devops,
    Researcher,
    Custom(String),
}

impl AgentRole {
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Coder => "coder",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Tester => "tester",
            AgentRole::Devops => "devops",
            AgentRole::Researcher => "researcher",
            AgentRole::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "coder" => AgentRole::Coder,
            "reviewer" => AgentRole::Reviewer,
            "tester" => AgentRole::Tester,
            "devops" => AgentRole::Devops,
            "researcher" => AgentRole::Researcher,
            other => AgentRole::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AgentRole {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentRole {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AgentRole::parse(&s))
    }
}

/// AI CLI tool backing an agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentProvider {
    Claude,
    Gemini,
    Codex,
    Custom(String),
}

impl AgentProvider {
    pub fn as_str(&self) -> &str {
        match self {
            AgentProvider::Claude => "claude",
            AgentProvider::Gemini => "gemini",
            AgentProvider::Codex => "codex",
            AgentProvider::Custom(name) => name,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "claude" => AgentProvider::Claude,
            "gemini" => AgentProvider::Gemini,
            "codex" => AgentProvider::Codex,
            other => AgentProvider::Custom(other.to_string()),
        }
    }

    /// The CLI command launched inside the runtime session.
    pub fn command(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AgentProvider {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentProvider {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AgentProvider::parse(&s))
    }
}

/// Lifecycle state of an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Runtime spawn issued; the CLI is starting up
    Spawning,
    /// Alive and available for assignment
    Idle,
    /// Assigned to a task
    Working,
    /// Unreachable or failed; kept for inspection
    Error,
    /// Finished its work normally
    Completed,
    /// Killed or lost; terminal
    Terminated,
}

impl AgentState {
    /// Terminal states are never revisited and are skipped by the reconciler.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Terminated | AgentState::Completed)
    }
}

crate::simple_display! {
    AgentState {
        Spawning => "spawning",
        Idle => "idle",
        Working => "working",
        Error => "error",
        Completed => "completed",
        Terminated => "terminated",
    }
}

/// Backend-specific handle identifying where an agent lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// Terminal-multiplexer pane (local or behind a remote shell)
    Pane { session: String, window: u32, pane: u32 },
    /// Container engine ID
    Container { id: String },
    /// Cluster pod
    Pod { name: String, namespace: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Pane { session, window, pane } => {
                write!(f, "{}:{}.{}", session, window, pane)
            }
            Location::Container { id } => write!(f, "container:{}", short_id(id)),
            Location::Pod { name, namespace } => write!(f, "pod:{}/{}", namespace, name),
        }
    }
}

fn short_id(id: &str) -> &str {
    crate::id::short(id, 12)
}

/// Pure configuration for spawning agents of a given shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTemplate {
    pub id: String,
    pub name: String,
    pub role: AgentRole,
    pub provider: AgentProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Runtime preferred when the spawn request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

impl AgentTemplate {
    /// Built-in default template for a role, used when a spawn request
    /// names neither a template nor a provider.
    pub fn default_for_role(role: AgentRole) -> Self {
        let name = format!("{}-default", role.as_str());
        Self {
            id: name.clone(),
            name,
            role,
            provider: AgentProvider::Claude,
            system_prompt: None,
            working_directory: None,
            preferred_runtime: None,
            env: Vec::new(),
        }
    }
}

/// One running AI CLI process.
///
/// Invariants (enforced by the orchestrator's mutation path):
/// - `state == Working` ⇔ `current_task_id` is set
/// - terminal state ⇒ `current_task_id` is `None`
/// - the instance owns its `location` exclusively for its lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInstance {
    pub id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    pub name: String,
    pub role: AgentRole,
    pub provider: AgentProvider,
    pub state: AgentState,
    /// Runtime this agent was spawned on (`runtime.<id>` config key).
    pub runtime_id: String,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AgentInstance {
    /// Transition to `Working` on the given task.
    pub fn start_task(&mut self, task_id: TaskId, now: DateTime<Utc>) {
        self.state = AgentState::Working;
        self.current_task_id = Some(task_id);
        self.last_activity_at = now;
    }

    /// Transition back to `Idle`, releasing any current task.
    pub fn release_task(&mut self, now: DateTime<Utc>) {
        self.state = AgentState::Idle;
        self.current_task_id = None;
        self.last_activity_at = now;
    }

    /// Transition to a terminal state, clearing the task pointer.
    pub fn terminate(&mut self, now: DateTime<Utc>) {
        self.state = AgentState::Terminated;
        self.current_task_id = None;
        self.last_activity_at = now;
    }

    /// Mark the agent lost or failed with a reason.
    pub fn mark_error(&mut self, message: impl Into<String>, now: DateTime<Utc>) {
        self.state = AgentState::Error;
        self.error_message = Some(message.into());
        self.current_task_id = None;
        self.last_activity_at = now;
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
