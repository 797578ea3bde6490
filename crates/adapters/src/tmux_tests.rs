// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_core::AgentId;

fn spec() -> SpawnSpec {
    let mut spec = SpawnSpec::new(AgentId::from_string("agt-ABC123"), "claude");
    spec.working_dir = Some("/work/repo".into());
    spec.env = vec![("HQ_AGENT_ID".to_string(), "agt-ABC123".to_string())];
    spec
}

#[test]
fn new_session_args_include_dir_env_and_command() {
    let args = new_session_args(&spec(), "hq-abc123");
    assert_eq!(
        args,
        [
            "new-session",
            "-d",
            "-s",
            "hq-abc123",
            "-c",
            "/work/repo",
            "-e",
            "HQ_AGENT_ID=agt-ABC123",
            "claude",
        ]
    );
}

#[test]
fn send_keys_uses_literal_flag_and_separator() {
    let args = send_keys_args("hq-1:0.0", "fix the bug; rm -rf looks scary");
    assert_eq!(
        args,
        ["send-keys", "-t", "hq-1:0.0", "-l", "--", "fix the bug; rm -rf looks scary"]
    );
}

#[test]
fn capture_args_request_scrollback() {
    let args = capture_args("hq-1:0.0", 40);
    assert_eq!(args, ["capture-pane", "-p", "-t", "hq-1:0.0", "-S", "-40"]);
}

#[test]
fn session_name_derives_from_agent_id() {
    let adapter = TmuxAdapter::local("local", None);
    assert_eq!(adapter.session_for(&spec()), "hq-abc123");

    let adapter = TmuxAdapter::local("local", Some("team".to_string()));
    assert_eq!(adapter.session_for(&spec()), "team-abc123");
}

#[test]
fn attach_command_targets_exact_session() {
    let adapter = TmuxAdapter::local("local", None);
    let loc = Location::Pane { session: "hq-abc".to_string(), window: 0, pane: 0 };
    assert_eq!(adapter.attach_command(&loc), "tmux attach-session -t =hq-abc");
}

#[test]
fn remote_kind_is_ssh() {
    let spec = hq_core::RemoteSpec {
        host: "h".to_string(),
        user: None,
        port: None,
        identity_file: None,
    };
    let adapter = TmuxAdapter::remote("build", spec);
    assert_eq!(adapter.kind(), "ssh");
    assert_eq!(TmuxAdapter::local("l", None).kind(), "local-tmux");
}

#[test]
fn wrong_location_rejected() {
    let container = Location::Container { id: "c1".to_string() };
    assert!(matches!(pane_target(&container), Err(AdapterError::WrongLocation(_))));
}
