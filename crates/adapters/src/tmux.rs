// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal-multiplexer adapter.
//!
//! Agents live in detached tmux sessions, one session per agent. The same
//! adapter serves the `local-tmux` and `ssh` runtime types; a
//! [`ShellRoute`] decides where the tmux commands execute. Prompts with
//! newlines or special characters go through tmux's paste buffer, never
//! through shell interpolation.

use async_trait::async_trait;
use hq_core::Location;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{
    name_suffix, AdapterError, HealthReport, RuntimeAdapter, ShellRoute, SpawnSpec,
};

/// Buffer name used for paste delivery, scoped to avoid clobbering user buffers.
const PASTE_BUFFER: &str = "hq-paste";

pub struct TmuxAdapter {
    id: String,
    session_prefix: String,
    route: ShellRoute,
}

impl TmuxAdapter {
    /// Adapter for tmux on this machine.
    pub fn local(id: impl Into<String>, session_prefix: Option<String>) -> Self {
        Self {
            id: id.into(),
            session_prefix: session_prefix.unwrap_or_else(|| "hq".to_string()),
            route: ShellRoute::Local,
        }
    }

    /// Adapter for tmux behind a remote shell.
    pub fn remote(id: impl Into<String>, spec: hq_core::RemoteSpec) -> Self {
        Self {
            id: id.into(),
            session_prefix: "hq".to_string(),
            route: ShellRoute::Remote(spec),
        }
    }

    fn session_for(&self, spec: &SpawnSpec) -> String {
        format!("{}-{}", self.session_prefix, name_suffix(&spec.agent_id))
    }

    /// Run a tmux command, capturing output.
    async fn tmux(&self, args: &[String]) -> Result<std::process::Output, AdapterError> {
        let (program, args) = self.route.command(args);
        tokio::process::Command::new(&program)
            .args(&args)
            .output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("failed to run {program}: {e}")))
    }

    /// Run a tmux command that reads stdin (paste delivery).
    async fn tmux_with_stdin(
        &self,
        args: &[String],
        input: &str,
    ) -> Result<std::process::Output, AdapterError> {
        let (program, args) = self.route.command(args);
        let mut child = tokio::process::Command::new(&program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::Unavailable(format!("failed to run {program}: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| AdapterError::Unavailable(format!("tmux stdin write: {e}")))?;
        }
        child
            .wait_with_output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("tmux wait: {e}")))
    }
}

/// Extract the tmux target (`session:window.pane`) from a pane location.
fn pane_target(location: &Location) -> Result<String, AdapterError> {
    match location {
        Location::Pane { session, window, pane } => Ok(format!("{session}:{window}.{pane}")),
        other => Err(AdapterError::WrongLocation(other.to_string())),
    }
}

fn session_of(location: &Location) -> Result<&str, AdapterError> {
    match location {
        Location::Pane { session, .. } => Ok(session),
        other => Err(AdapterError::WrongLocation(other.to_string())),
    }
}

/// Arguments for `tmux new-session` hosting an agent.
pub(crate) fn new_session_args(spec: &SpawnSpec, session: &str) -> Vec<String> {
    let mut args = vec![
        "new-session".to_string(),
        "-d".to_string(),
        "-s".to_string(),
        session.to_string(),
    ];
    if let Some(dir) = &spec.working_dir {
        args.push("-c".to_string());
        args.push(dir.display().to_string());
    }
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.command.clone());
    args
}

/// Arguments for `tmux send-keys` delivering literal text.
pub(crate) fn send_keys_args(target: &str, text: &str) -> Vec<String> {
    vec![
        "send-keys".to_string(),
        "-t".to_string(),
        target.to_string(),
        "-l".to_string(),
        "--".to_string(),
        text.to_string(),
    ]
}

/// Arguments for `tmux capture-pane` reading the last `lines` lines.
pub(crate) fn capture_args(target: &str, lines: u32) -> Vec<String> {
    vec![
        "capture-pane".to_string(),
        "-p".to_string(),
        "-t".to_string(),
        target.to_string(),
        "-S".to_string(),
        format!("-{lines}"),
    ]
}

#[async_trait]
impl RuntimeAdapter for TmuxAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        if self.route.is_remote() {
            "ssh"
        } else {
            "local-tmux"
        }
    }

    async fn probe(&self) -> HealthReport {
        match self.tmux(&["-V".to_string()]).await {
            Ok(output) if output.status.success() => HealthReport::healthy(),
            Ok(output) => HealthReport::unhealthy(format!(
                "tmux -V failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => HealthReport::unhealthy(e.to_string()),
        }
    }

    async fn spawn_agent(&self, spec: &SpawnSpec) -> Result<Location, AdapterError> {
        let session = self.session_for(spec);
        let output = self.tmux(&new_session_args(spec, &session)).await?;
        if !output.status.success() {
            return Err(AdapterError::SpawnFailed(format!(
                "tmux new-session: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(session = %session, runtime = %self.id, "spawned agent session");
        Ok(Location::Pane { session, window: 0, pane: 0 })
    }

    async fn send_keys(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let target = pane_target(location)?;
        let output = self.tmux(&send_keys_args(&target, text)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(target));
        }
        // Submit the line
        let enter =
            vec!["send-keys".to_string(), "-t".to_string(), target.clone(), "Enter".to_string()];
        let output = self.tmux(&enter).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(target));
        }
        Ok(())
    }

    async fn interrupt(&self, location: &Location) -> Result<(), AdapterError> {
        let target = pane_target(location)?;
        let args =
            vec!["send-keys".to_string(), "-t".to_string(), target.clone(), "C-c".to_string()];
        let output = self.tmux(&args).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(target));
        }
        Ok(())
    }

    async fn paste(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let target = pane_target(location)?;
        let load = vec![
            "load-buffer".to_string(),
            "-b".to_string(),
            PASTE_BUFFER.to_string(),
            "-".to_string(),
        ];
        let output = self.tmux_with_stdin(&load, text).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(target));
        }
        let paste = vec![
            "paste-buffer".to_string(),
            "-d".to_string(),
            "-b".to_string(),
            PASTE_BUFFER.to_string(),
            "-t".to_string(),
            target.clone(),
        ];
        let output = self.tmux(&paste).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(target));
        }
        Ok(())
    }

    async fn capture(&self, location: &Location, lines: u32) -> String {
        let Ok(target) = pane_target(location) else {
            return String::new();
        };
        match self.tmux(&capture_args(&target, lines)).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).to_string()
            }
            Ok(_) => {
                warn!(target = %target, "capture-pane failed, session gone?");
                String::new()
            }
            Err(e) => {
                warn!(target = %target, error = %e, "capture-pane failed");
                String::new()
            }
        }
    }

    async fn is_alive(&self, location: &Location) -> bool {
        let Ok(session) = session_of(location) else {
            return false;
        };
        let args =
            vec!["has-session".to_string(), "-t".to_string(), format!("={session}")];
        matches!(self.tmux(&args).await, Ok(output) if output.status.success())
    }

    async fn kill(&self, location: &Location) -> Result<(), AdapterError> {
        let session = session_of(location)?;
        let args = vec!["kill-session".to_string(), "-t".to_string(), format!("={session}")];
        // A missing session is success: kill is idempotent.
        let _ = self.tmux(&args).await?;
        Ok(())
    }

    fn attach_command(&self, location: &Location) -> String {
        let session = match location {
            Location::Pane { session, .. } => session.as_str(),
            _ => return String::new(),
        };
        format!("{}tmux attach-session -t ={session}", self.route.attach_prefix())
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
