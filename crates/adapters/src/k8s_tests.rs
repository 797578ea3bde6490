// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_core::AgentId;

fn spec() -> SpawnSpec {
    let mut spec = SpawnSpec::new(AgentId::from_string("agt-POD9"), "codex");
    spec.env = vec![("HQ_TASK".to_string(), "tsk-1".to_string())];
    spec.working_dir = Some("/workspace".into());
    spec
}

#[test]
fn pod_manifest_runs_tmux_foreground() {
    let pod = build_pod(&spec(), "hq-pod9", "agents", "hq-agent:latest");

    assert_eq!(pod.metadata.name.as_deref(), Some("hq-pod9"));
    assert_eq!(pod.metadata.namespace.as_deref(), Some("agents"));
    let labels = pod.metadata.labels.unwrap();
    assert_eq!(labels["app.kubernetes.io/managed-by"], "hqd");

    let pod_spec = pod.spec.unwrap();
    assert_eq!(pod_spec.restart_policy.as_deref(), Some("Never"));
    let container = &pod_spec.containers[0];
    assert_eq!(container.name, "agent");
    assert_eq!(container.tty, Some(true));
    assert_eq!(container.stdin, Some(true));
    assert_eq!(container.working_dir.as_deref(), Some("/workspace"));
    assert_eq!(
        container.command.as_ref().unwrap(),
        &["tmux", "new-session", "-s", "main", "codex"]
    );
    let env = container.env.as_ref().unwrap();
    assert_eq!(env[0].name, "HQ_TASK");
    assert_eq!(env[0].value.as_deref(), Some("tsk-1"));
}

#[test]
fn exec_args_scope_namespace_and_stdin() {
    let args = exec_tmux_args("hq-pod9", "agents", false, &["kill-server".to_string()]);
    assert_eq!(args, ["exec", "-n", "agents", "hq-pod9", "--", "tmux", "kill-server"]);

    let args = exec_tmux_args("hq-pod9", "agents", true, &["load-buffer".to_string()]);
    assert_eq!(args[..2], ["exec", "-i"]);
}

#[test]
fn attach_command_names_pod() {
    let adapter = K8sAdapter::new("cluster", "agents", None);
    let loc = Location::Pod { name: "hq-pod9".to_string(), namespace: "agents".to_string() };
    assert_eq!(
        adapter.attach_command(&loc),
        "kubectl exec -it -n agents hq-pod9 -- tmux attach-session -t main"
    );
}

#[test]
fn wrong_location_rejected() {
    let pane = Location::Pane { session: "s".to_string(), window: 0, pane: 0 };
    assert!(matches!(pod_of(&pane), Err(AdapterError::WrongLocation(_))));
}
