// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container adapter.
//!
//! Each agent gets its own container running tmux as PID 1 (foreground, with
//! a tty), so the in-container terminal behaves exactly like the local one:
//! keys, paste buffer, and capture all go through `docker exec … tmux`.

use async_trait::async_trait;
use hq_core::Location;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{name_suffix, AdapterError, HealthReport, RuntimeAdapter, SpawnSpec};

/// tmux session name inside the container.
const INNER_SESSION: &str = "main";

pub struct DockerAdapter {
    id: String,
    image: String,
}

impl DockerAdapter {
    pub fn new(id: impl Into<String>, image: Option<String>) -> Self {
        Self { id: id.into(), image: image.unwrap_or_else(|| "hq-agent:latest".to_string()) }
    }

    async fn docker(&self, args: &[String]) -> Result<std::process::Output, AdapterError> {
        tokio::process::Command::new("docker")
            .args(args)
            .output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("failed to run docker: {e}")))
    }
}

fn container_of(location: &Location) -> Result<&str, AdapterError> {
    match location {
        Location::Container { id } => Ok(id),
        other => Err(AdapterError::WrongLocation(other.to_string())),
    }
}

/// Arguments for `docker run` hosting an agent container.
pub(crate) fn run_args(spec: &SpawnSpec, name: &str, image: &str) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-d".to_string(),
        "-t".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];
    for (key, value) in &spec.env {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(dir) = &spec.working_dir {
        args.push("-w".to_string());
        args.push(dir.display().to_string());
    }
    args.push(image.to_string());
    // tmux in the foreground keeps the container alive for the agent's lifetime
    args.extend([
        "tmux".to_string(),
        "new-session".to_string(),
        "-s".to_string(),
        INNER_SESSION.to_string(),
        spec.command.clone(),
    ]);
    args
}

/// Arguments for a `docker exec … tmux …` invocation.
pub(crate) fn exec_tmux_args(container: &str, tmux_args: &[String]) -> Vec<String> {
    let mut args = vec!["exec".to_string(), container.to_string(), "tmux".to_string()];
    args.extend(tmux_args.iter().cloned());
    args
}

fn inner_target() -> String {
    format!("{INNER_SESSION}:0.0")
}

#[async_trait]
impl RuntimeAdapter for DockerAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "docker"
    }

    async fn probe(&self) -> HealthReport {
        let args = vec![
            "version".to_string(),
            "--format".to_string(),
            "{{.Server.Version}}".to_string(),
        ];
        match self.docker(&args).await {
            Ok(output) if output.status.success() => HealthReport::healthy(),
            Ok(output) => HealthReport::unhealthy(format!(
                "docker daemon unreachable: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => HealthReport::unhealthy(e.to_string()),
        }
    }

    async fn spawn_agent(&self, spec: &SpawnSpec) -> Result<Location, AdapterError> {
        let name = format!("hq-{}", name_suffix(&spec.agent_id));
        let output = self.docker(&run_args(spec, &name, &self.image)).await?;
        if !output.status.success() {
            return Err(AdapterError::SpawnFailed(format!(
                "docker run: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(container = %name, image = %self.image, "spawned agent container");
        Ok(Location::Container { id: name })
    }

    async fn send_keys(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let container = container_of(location)?;
        let target = inner_target();
        let send = vec![
            "send-keys".to_string(),
            "-t".to_string(),
            target.clone(),
            "-l".to_string(),
            "--".to_string(),
            text.to_string(),
        ];
        let output = self.docker(&exec_tmux_args(container, &send)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(container.to_string()));
        }
        let enter =
            vec!["send-keys".to_string(), "-t".to_string(), target, "Enter".to_string()];
        let output = self.docker(&exec_tmux_args(container, &enter)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(container.to_string()));
        }
        Ok(())
    }

    async fn interrupt(&self, location: &Location) -> Result<(), AdapterError> {
        let container = container_of(location)?;
        let args = vec![
            "send-keys".to_string(),
            "-t".to_string(),
            inner_target(),
            "C-c".to_string(),
        ];
        let output = self.docker(&exec_tmux_args(container, &args)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(container.to_string()));
        }
        Ok(())
    }

    async fn paste(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let container = container_of(location)?;
        // load-buffer from stdin needs -i on the exec
        let mut load = vec!["exec".to_string(), "-i".to_string(), container.to_string()];
        load.extend([
            "tmux".to_string(),
            "load-buffer".to_string(),
            "-b".to_string(),
            "hq-paste".to_string(),
            "-".to_string(),
        ]);
        let mut child = tokio::process::Command::new("docker")
            .args(&load)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::Unavailable(format!("failed to run docker: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| AdapterError::Unavailable(format!("docker stdin write: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("docker wait: {e}")))?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(container.to_string()));
        }

        let paste = vec![
            "paste-buffer".to_string(),
            "-d".to_string(),
            "-b".to_string(),
            "hq-paste".to_string(),
            "-t".to_string(),
            inner_target(),
        ];
        let output = self.docker(&exec_tmux_args(container, &paste)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(container.to_string()));
        }
        Ok(())
    }

    async fn capture(&self, location: &Location, lines: u32) -> String {
        let Ok(container) = container_of(location) else {
            return String::new();
        };
        let capture = vec![
            "capture-pane".to_string(),
            "-p".to_string(),
            "-t".to_string(),
            inner_target(),
            "-S".to_string(),
            format!("-{lines}"),
        ];
        match self.docker(&exec_tmux_args(container, &capture)).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).to_string()
            }
            Ok(_) => {
                warn!(container = %container, "capture failed, container gone?");
                String::new()
            }
            Err(e) => {
                warn!(container = %container, error = %e, "capture failed");
                String::new()
            }
        }
    }

    async fn is_alive(&self, location: &Location) -> bool {
        let Ok(container) = container_of(location) else {
            return false;
        };
        let args = vec![
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Running}}".to_string(),
            container.to_string(),
        ];
        match self.docker(&args).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            _ => false,
        }
    }

    async fn kill(&self, location: &Location) -> Result<(), AdapterError> {
        let container = container_of(location)?;
        let args = vec!["rm".to_string(), "-f".to_string(), container.to_string()];
        // "No such container" is success: kill is idempotent.
        let _ = self.docker(&args).await?;
        Ok(())
    }

    fn attach_command(&self, location: &Location) -> String {
        match location {
            Location::Container { id } => {
                format!("docker exec -it {id} tmux attach-session -t {INNER_SESSION}")
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
