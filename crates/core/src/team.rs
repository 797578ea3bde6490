// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named groups of agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AgentId, TeamId};

/// A named group of agent instances. Membership is by ID; the orchestrator
/// remains the owner of the instances themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_ids: Vec<AgentId>,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { id: TeamId::new(), name: name.into(), agent_ids: Vec::new(), created_at: now }
    }

    /// Add an agent; no-op if already a member.
    pub fn add_agent(&mut self, id: AgentId) {
        if !self.agent_ids.contains(&id) {
            self.agent_ids.push(id);
        }
    }

    /// Remove an agent; returns whether it was a member.
    pub fn remove_agent(&mut self, id: &AgentId) -> bool {
        let before = self.agent_ids.len();
        self.agent_ids.retain(|a| a != id);
        self.agent_ids.len() != before
    }
}
