// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hq-adapters: execution backends for agent processes.
//!
//! The [`RuntimeAdapter`] trait abstracts the four backends (local tmux,
//! docker, kubernetes pods, tmux behind a remote shell) behind the
//! spawn / send / capture / kill quartet. The [`RuntimeManager`] owns one
//! adapter per configured runtime and a health cache refreshed by a
//! periodic probe.

mod docker;
mod k8s;
mod manager;
mod shell_route;
mod tmux;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeRuntime};

pub use docker::DockerAdapter;
pub use k8s::K8sAdapter;
pub use manager::RuntimeManager;
pub use shell_route::ShellRoute;
pub use tmux::TmuxAdapter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hq_core::{AgentId, Location};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default deadline applied to adapter calls that reach a backend.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Errors from runtime adapter operations.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("location gone: {0}")]
    LocationGone(String),
    #[error("location {0} does not belong to this runtime")]
    WrongLocation(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("no runtime available: {0}")]
    NoRuntime(String),
}

/// Probe verdict for one runtime backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

hq_core::simple_display! {
    HealthStatus {
        Healthy => "healthy",
        Degraded => "degraded",
        Unhealthy => "unhealthy",
    }
}

/// Result of a health probe, kept in the manager's cache.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    pub fn healthy() -> Self {
        Self { status: HealthStatus::Healthy, detail: None, checked_at: Utc::now() }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            detail: Some(detail.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            detail: Some(detail.into()),
            checked_at: Utc::now(),
        }
    }
}

/// Everything an adapter needs to start one agent process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub agent_id: AgentId,
    /// CLI command launched inside the session (e.g. `claude`).
    pub command: String,
    pub working_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl SpawnSpec {
    pub fn new(agent_id: AgentId, command: impl Into<String>) -> Self {
        Self { agent_id, command: command.into(), working_dir: None, env: Vec::new() }
    }
}

/// An execution backend for agent processes.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// concurrently. `kill` is idempotent; `capture` returns an empty string on
/// failure (and logs); `is_alive` returns `false` on any error; `probe`
/// never fails, it reports.
#[async_trait]
pub trait RuntimeAdapter: Send + Sync + 'static {
    /// Config key of this runtime (`runtime.<id>`).
    fn id(&self) -> &str;

    /// Backend type name (`local-tmux`, `docker`, `k8s`, `ssh`).
    fn kind(&self) -> &'static str;

    /// Check the backend is reachable. Never errors; reports unhealthy.
    async fn probe(&self) -> HealthReport;

    /// Start an agent process; returns the location that now belongs to it.
    async fn spawn_agent(&self, spec: &SpawnSpec) -> Result<Location, AdapterError>;

    /// Type a line of text (plus Enter) into the agent's terminal.
    async fn send_keys(&self, location: &Location, text: &str) -> Result<(), AdapterError>;

    /// Deliver multi-line or special-character text through the backend's
    /// paste primitive rather than keystroke emulation.
    async fn paste(&self, location: &Location, text: &str) -> Result<(), AdapterError>;

    /// Send the termination key sequence (Ctrl-C) to the agent's terminal.
    async fn interrupt(&self, location: &Location) -> Result<(), AdapterError>;

    /// Capture the last `lines` lines of terminal output. Empty on failure.
    async fn capture(&self, location: &Location, lines: u32) -> String;

    /// Whether the location still hosts a live session. False on any error.
    async fn is_alive(&self, location: &Location) -> bool;

    /// Tear the location down. Succeeds if it is already gone.
    async fn kill(&self, location: &Location) -> Result<(), AdapterError>;

    /// Shell command a human can run to attach to the agent's terminal.
    fn attach_command(&self, location: &Location) -> String;
}

/// Apply a deadline to an adapter call, mapping expiry to
/// [`AdapterError::Timeout`].
pub async fn with_deadline<T>(
    deadline: Duration,
    fut: impl std::future::Future<Output = Result<T, AdapterError>>,
) -> Result<T, AdapterError> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterError::Timeout(deadline)),
    }
}

/// Short suffix of an agent ID used in session/container/pod names.
pub(crate) fn name_suffix(agent_id: &AgentId) -> String {
    agent_id
        .as_str()
        .strip_prefix("agt-")
        .unwrap_or(agent_id.as_str())
        .to_lowercase()
}
