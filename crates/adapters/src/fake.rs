// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted runtime for tests: records calls, spawns instantly, and lets
//! tests control liveness and failure modes.

use async_trait::async_trait;
use hq_core::Location;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{AdapterError, HealthReport, RuntimeAdapter, SpawnSpec};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    Spawn { agent_id: String, command: String },
    SendKeys { session: String, text: String },
    Paste { session: String, text: String },
    Capture { session: String, lines: u32 },
    Interrupt { session: String },
    Kill { session: String },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<FakeCall>,
    alive: HashSet<String>,
    captured: HashMap<String, String>,
}

/// In-memory [`RuntimeAdapter`] with scripted behaviour.
#[derive(Clone)]
pub struct FakeRuntime {
    id: String,
    state: Arc<Mutex<FakeState>>,
    fail_spawn: Arc<AtomicBool>,
    healthy: Arc<AtomicBool>,
}

impl FakeRuntime {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(FakeState::default())),
            fail_spawn: Arc::new(AtomicBool::new(false)),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make subsequent spawns fail with `SpawnFailed`.
    pub fn fail_next_spawns(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    /// Control the probe verdict.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Mark a session dead (simulates a crashed backend session).
    pub fn kill_session(&self, session: &str) {
        self.state.lock().alive.remove(session);
    }

    /// Script what `capture` returns for a session.
    pub fn set_captured(&self, session: &str, text: &str) {
        self.state.lock().captured.insert(session.to_string(), text.to_string());
    }

    /// Recorded calls, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().calls.clone()
    }

    pub fn live_sessions(&self) -> Vec<String> {
        let mut sessions: Vec<_> = self.state.lock().alive.iter().cloned().collect();
        sessions.sort();
        sessions
    }

    fn session_of(location: &Location) -> Result<String, AdapterError> {
        match location {
            Location::Pane { session, .. } => Ok(session.clone()),
            other => Err(AdapterError::WrongLocation(other.to_string())),
        }
    }
}

#[async_trait]
impl RuntimeAdapter for FakeRuntime {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "local-tmux"
    }

    async fn probe(&self) -> HealthReport {
        if self.healthy.load(Ordering::SeqCst) {
            HealthReport::healthy()
        } else {
            HealthReport::unhealthy("scripted unhealthy")
        }
    }

    async fn spawn_agent(&self, spec: &SpawnSpec) -> Result<Location, AdapterError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(AdapterError::SpawnFailed("scripted spawn failure".to_string()));
        }
        let session = format!("fake-{}", spec.agent_id.as_str());
        let mut state = self.state.lock();
        state.calls.push(FakeCall::Spawn {
            agent_id: spec.agent_id.as_str().to_string(),
            command: spec.command.clone(),
        });
        state.alive.insert(session.clone());
        Ok(Location::Pane { session, window: 0, pane: 0 })
    }

    async fn send_keys(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let session = Self::session_of(location)?;
        let mut state = self.state.lock();
        if !state.alive.contains(&session) {
            return Err(AdapterError::LocationGone(session));
        }
        state.calls.push(FakeCall::SendKeys { session, text: text.to_string() });
        Ok(())
    }

    async fn paste(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let session = Self::session_of(location)?;
        let mut state = self.state.lock();
        if !state.alive.contains(&session) {
            return Err(AdapterError::LocationGone(session));
        }
        state.calls.push(FakeCall::Paste { session, text: text.to_string() });
        Ok(())
    }

    async fn interrupt(&self, location: &Location) -> Result<(), AdapterError> {
        let session = Self::session_of(location)?;
        let mut state = self.state.lock();
        if !state.alive.contains(&session) {
            return Err(AdapterError::LocationGone(session));
        }
        state.calls.push(FakeCall::Interrupt { session });
        Ok(())
    }

    async fn capture(&self, location: &Location, lines: u32) -> String {
        let Ok(session) = Self::session_of(location) else {
            return String::new();
        };
        let mut state = self.state.lock();
        state.calls.push(FakeCall::Capture { session: session.clone(), lines });
        state.captured.get(&session).cloned().unwrap_or_default()
    }

    async fn is_alive(&self, location: &Location) -> bool {
        match Self::session_of(location) {
            Ok(session) => self.state.lock().alive.contains(&session),
            Err(_) => false,
        }
    }

    async fn kill(&self, location: &Location) -> Result<(), AdapterError> {
        let session = Self::session_of(location)?;
        let mut state = self.state.lock();
        state.alive.remove(&session);
        state.calls.push(FakeCall::Kill { session });
        Ok(())
    }

    fn attach_command(&self, location: &Location) -> String {
        match location {
            Location::Pane { session, .. } => format!("tmux attach-session -t ={session}"),
            _ => String::new(),
        }
    }
}
