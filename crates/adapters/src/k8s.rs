// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes pod adapter.
//!
//! Pod lifecycle (create, probe, delete) goes through the Kubernetes API;
//! in-pod terminal operations go through `kubectl exec … tmux`, the same
//! command set the other adapters use. Each agent gets one pod running
//! tmux in the foreground with a tty.

use async_trait::async_trait;
use hq_core::Location;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{name_suffix, AdapterError, HealthReport, RuntimeAdapter, SpawnSpec};

const INNER_SESSION: &str = "main";
const AGENT_CONTAINER: &str = "agent";

pub struct K8sAdapter {
    id: String,
    namespace: String,
    image: String,
    client: OnceCell<Client>,
}

impl K8sAdapter {
    pub fn new(id: impl Into<String>, namespace: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            image: image.unwrap_or_else(|| "hq-agent:latest".to_string()),
            client: OnceCell::new(),
        }
    }

    /// Lazily build the kube client from the ambient kubeconfig.
    async fn client(&self) -> Result<Client, AdapterError> {
        self.client
            .get_or_try_init(|| async {
                Client::try_default()
                    .await
                    .map_err(|e| AdapterError::Unavailable(format!("kube client: {e}")))
            })
            .await
            .cloned()
    }

    async fn kubectl(&self, args: &[String]) -> Result<std::process::Output, AdapterError> {
        tokio::process::Command::new("kubectl")
            .args(args)
            .output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("failed to run kubectl: {e}")))
    }
}

fn pod_of(location: &Location) -> Result<(&str, &str), AdapterError> {
    match location {
        Location::Pod { name, namespace } => Ok((name, namespace)),
        other => Err(AdapterError::WrongLocation(other.to_string())),
    }
}

/// Build the pod manifest hosting an agent.
pub(crate) fn build_pod(spec: &SpawnSpec, name: &str, namespace: &str, image: &str) -> Pod {
    let env: Vec<EnvVar> = spec
        .env
        .iter()
        .map(|(k, v)| EnvVar { name: k.clone(), value: Some(v.clone()), ..Default::default() })
        .collect();

    let mut labels = BTreeMap::new();
    labels.insert("app.kubernetes.io/managed-by".to_string(), "hqd".to_string());
    labels.insert("hq.dev/agent".to_string(), name.to_string());

    let working_dir = spec.working_dir.as_ref().map(|d| d.display().to_string());

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(PodSpec {
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: AGENT_CONTAINER.to_string(),
                image: Some(image.to_string()),
                command: Some(vec![
                    "tmux".to_string(),
                    "new-session".to_string(),
                    "-s".to_string(),
                    INNER_SESSION.to_string(),
                    spec.command.clone(),
                ]),
                working_dir,
                env: if env.is_empty() { None } else { Some(env) },
                tty: Some(true),
                stdin: Some(true),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `kubectl exec` argument list for an in-pod tmux command.
pub(crate) fn exec_tmux_args(
    pod: &str,
    namespace: &str,
    stdin: bool,
    tmux_args: &[String],
) -> Vec<String> {
    let mut args = vec!["exec".to_string()];
    if stdin {
        args.push("-i".to_string());
    }
    args.extend(["-n".to_string(), namespace.to_string(), pod.to_string()]);
    args.extend(["--".to_string(), "tmux".to_string()]);
    args.extend(tmux_args.iter().cloned());
    args
}

fn inner_target() -> String {
    format!("{INNER_SESSION}:0.0")
}

#[async_trait]
impl RuntimeAdapter for K8sAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        "k8s"
    }

    async fn probe(&self) -> HealthReport {
        match self.client().await {
            Ok(client) => match client.apiserver_version().await {
                Ok(_) => HealthReport::healthy(),
                Err(e) => HealthReport::unhealthy(format!("apiserver unreachable: {e}")),
            },
            Err(e) => HealthReport::unhealthy(e.to_string()),
        }
    }

    async fn spawn_agent(&self, spec: &SpawnSpec) -> Result<Location, AdapterError> {
        let name = format!("hq-{}", name_suffix(&spec.agent_id));
        let client = self.client().await?;
        let pods: Api<Pod> = Api::namespaced(client, &self.namespace);
        let pod = build_pod(spec, &name, &self.namespace, &self.image);
        pods.create(&PostParams::default(), &pod)
            .await
            .map_err(|e| AdapterError::SpawnFailed(format!("pod create: {e}")))?;
        debug!(pod = %name, namespace = %self.namespace, "created agent pod");
        Ok(Location::Pod { name, namespace: self.namespace.clone() })
    }

    async fn send_keys(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let (pod, namespace) = pod_of(location)?;
        let target = inner_target();
        let send = vec![
            "send-keys".to_string(),
            "-t".to_string(),
            target.clone(),
            "-l".to_string(),
            "--".to_string(),
            text.to_string(),
        ];
        let output = self.kubectl(&exec_tmux_args(pod, namespace, false, &send)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(pod.to_string()));
        }
        let enter =
            vec!["send-keys".to_string(), "-t".to_string(), target, "Enter".to_string()];
        let output = self.kubectl(&exec_tmux_args(pod, namespace, false, &enter)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(pod.to_string()));
        }
        Ok(())
    }

    async fn interrupt(&self, location: &Location) -> Result<(), AdapterError> {
        let (pod, namespace) = pod_of(location)?;
        let args = vec![
            "send-keys".to_string(),
            "-t".to_string(),
            inner_target(),
            "C-c".to_string(),
        ];
        let output = self.kubectl(&exec_tmux_args(pod, namespace, false, &args)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(pod.to_string()));
        }
        Ok(())
    }

    async fn paste(&self, location: &Location, text: &str) -> Result<(), AdapterError> {
        let (pod, namespace) = pod_of(location)?;
        let load = vec![
            "load-buffer".to_string(),
            "-b".to_string(),
            "hq-paste".to_string(),
            "-".to_string(),
        ];
        let args = exec_tmux_args(pod, namespace, true, &load);
        let mut child = tokio::process::Command::new("kubectl")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AdapterError::Unavailable(format!("failed to run kubectl: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| AdapterError::Unavailable(format!("kubectl stdin write: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("kubectl wait: {e}")))?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(pod.to_string()));
        }

        let paste = vec![
            "paste-buffer".to_string(),
            "-d".to_string(),
            "-b".to_string(),
            "hq-paste".to_string(),
            "-t".to_string(),
            inner_target(),
        ];
        let output = self.kubectl(&exec_tmux_args(pod, namespace, false, &paste)).await?;
        if !output.status.success() {
            return Err(AdapterError::LocationGone(pod.to_string()));
        }
        Ok(())
    }

    async fn capture(&self, location: &Location, lines: u32) -> String {
        let Ok((pod, namespace)) = pod_of(location) else {
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
        match self.kubectl(&exec_tmux_args(pod, namespace, false, &capture)).await {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).to_string()
            }
            Ok(_) => {
                warn!(pod = %pod, "capture failed, pod gone?");
                String::new()
            }
            Err(e) => {
                warn!(pod = %pod, error = %e, "capture failed");
                String::new()
            }
        }
    }

    async fn is_alive(&self, location: &Location) -> bool {
        let Ok((pod, namespace)) = pod_of(location) else {
            return false;
        };
        let Ok(client) = self.client().await else {
            return false;
        };
        let pods: Api<Pod> = Api::namespaced(client, namespace);
        match pods.get_opt(pod).await {
            Ok(Some(p)) => {
                let phase = p
                    .status
                    .as_ref()
                    .and_then(|s| s.phase.as_deref())
                    .unwrap_or("Unknown");
                matches!(phase, "Running" | "Pending")
            }
            _ => false,
        }
    }

    async fn kill(&self, location: &Location) -> Result<(), AdapterError> {
        let (pod, namespace) = pod_of(location)?;
        let client = self.client().await?;
        let pods: Api<Pod> = Api::namespaced(client, namespace);
        match pods.delete(pod, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            // Already gone: kill is idempotent
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(AdapterError::Unavailable(format!("pod delete: {e}"))),
        }
    }

    fn attach_command(&self, location: &Location) -> String {
        match location {
            Location::Pod { name, namespace } => {
                format!(
                    "kubectl exec -it -n {namespace} {name} -- tmux attach-session -t {INNER_SESSION}"
                )
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod tests;
