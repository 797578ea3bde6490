// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec() -> RemoteSpec {
    RemoteSpec {
        host: "build.example.com".to_string(),
        user: Some("ci".to_string()),
        port: Some(2222),
        identity_file: Some("/keys/ci".into()),
    }
}

#[test]
fn local_route_runs_tmux_directly() {
    let (program, args) = ShellRoute::Local.command(&["has-session".to_string()]);
    assert_eq!(program, "tmux");
    assert_eq!(args, ["has-session"]);
}

#[test]
fn remote_route_wraps_in_ssh() {
    let (program, args) = ShellRoute::Remote(spec()).command(&["kill-session".to_string()]);
    assert_eq!(program, "ssh");
    assert_eq!(
        args,
        ["-p", "2222", "-i", "/keys/ci", "ci@build.example.com", "--", "tmux", "kill-session"]
    );
}

#[test]
fn remote_attach_prefix_forces_tty() {
    let prefix = ShellRoute::Remote(spec()).attach_prefix();
    assert!(prefix.starts_with("ssh -t "));
    assert!(prefix.contains("ci@build.example.com"));
    assert_eq!(ShellRoute::Local.attach_prefix(), "");
}
