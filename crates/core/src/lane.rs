// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Swimlanes: board partitions that group tasks sharing a workspace,
//! provider, and default toggles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::agent::AgentProvider;
use crate::id::LaneId;

/// Default toggle values stamped onto tasks created in a lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaneToggles {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_pilot: bool,
    #[serde(default)]
    pub auto_close: bool,
    #[serde(default)]
    pub use_worktree: bool,
    #[serde(default)]
    pub use_memory: bool,
}

/// A board partition. Lifetime independent of its tasks and agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwimLane {
    pub id: LaneId,
    pub name: String,
    /// Runtime that agents working this lane are spawned on.
    pub runtime_id: String,
    pub working_directory: PathBuf,
    /// Multiplexer session name prefix for agents of this lane.
    pub session_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<AgentProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub default_toggles: LaneToggles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl SwimLane {
    pub fn new(name: impl Into<String>, runtime_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        let name = name.into();
        let session_name = format!("hq-{}", name.to_lowercase().replace(' ', "-"));
        Self {
            id: LaneId::new(),
            name,
            runtime_id: runtime_id.into(),
            working_directory: PathBuf::from("."),
            session_name,
            provider: None,
            model: None,
            default_toggles: LaneToggles::default(),
            context_instructions: None,
            memory_path: None,
            created_at: now,
        }
    }
}
