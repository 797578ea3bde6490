// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_core::AgentId;

fn spec() -> SpawnSpec {
    let mut spec = SpawnSpec::new(AgentId::from_string("agt-XY12"), "gemini");
    spec.env = vec![("API_MODE".to_string(), "ci".to_string())];
    spec.working_dir = Some("/workspace".into());
    spec
}

#[test]
fn run_args_keep_tmux_in_foreground() {
    let args = run_args(&spec(), "hq-xy12", "hq-agent:latest");
    assert_eq!(
        args,
        [
            "run",
            "-d",
            "-t",
            "--name",
            "hq-xy12",
            "-e",
            "API_MODE=ci",
            "-w",
            "/workspace",
            "hq-agent:latest",
            "tmux",
            "new-session",
            "-s",
            "main",
            "gemini",
        ]
    );
}

#[test]
fn exec_routes_through_container_tmux() {
    let args = exec_tmux_args("hq-xy12", &["kill-server".to_string()]);
    assert_eq!(args, ["exec", "hq-xy12", "tmux", "kill-server"]);
}

#[test]
fn default_image_applies() {
    let adapter = DockerAdapter::new("docker", None);
    assert_eq!(adapter.image, "hq-agent:latest");
    let adapter = DockerAdapter::new("docker", Some("custom:1".to_string()));
    assert_eq!(adapter.image, "custom:1");
}

#[test]
fn attach_command_is_interactive() {
    let adapter = DockerAdapter::new("docker", None);
    let loc = Location::Container { id: "hq-xy12".to_string() };
    assert_eq!(
        adapter.attach_command(&loc),
        "docker exec -it hq-xy12 tmux attach-session -t main"
    );
}

#[test]
fn wrong_location_rejected() {
    let pane = Location::Pane { session: "s".to_string(), window: 0, pane: 0 };
    assert!(matches!(container_of(&pane), Err(AdapterError::WrongLocation(_))));
}
