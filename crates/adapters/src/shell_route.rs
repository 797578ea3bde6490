// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local vs remote-shell command routing.
//!
//! The tmux adapter runs the same tmux commands whether the multiplexer is
//! on this machine or behind ssh; the route decides the actual program and
//! argument prefix.

use hq_core::RemoteSpec;

/// Where tmux commands for a runtime are executed.
#[derive(Debug, Clone)]
pub enum ShellRoute {
    /// Run `tmux` directly.
    Local,
    /// Wrap every command in `ssh <target> -- …`.
    Remote(RemoteSpec),
}

impl ShellRoute {
    /// Build the `(program, args)` pair for a tmux invocation on this route.
    pub fn command(&self, tmux_args: &[String]) -> (String, Vec<String>) {
        match self {
            ShellRoute::Local => ("tmux".to_string(), tmux_args.to_vec()),
            ShellRoute::Remote(spec) => {
                let mut args = ssh_args(spec);
                args.push("--".to_string());
                args.push("tmux".to_string());
                args.extend(tmux_args.iter().cloned());
                ("ssh".to_string(), args)
            }
        }
    }

    /// Prefix for a human-facing attach command line.
    pub fn attach_prefix(&self) -> String {
        match self {
            ShellRoute::Local => String::new(),
            ShellRoute::Remote(spec) => {
                let mut parts = vec!["ssh".to_string(), "-t".to_string()];
                parts.extend(ssh_args(spec));
                format!("{} ", parts.join(" "))
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ShellRoute::Remote(_))
    }
}

fn ssh_args(spec: &RemoteSpec) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(port) = spec.port {
        args.push("-p".to_string());
        args.push(port.to_string());
    }
    if let Some(identity) = &spec.identity_file {
        args.push("-i".to_string());
        args.push(identity.display().to_string());
    }
    args.push(spec.target());
    args
}

#[cfg(test)]
#[path = "shell_route_tests.rs"]
mod tests;
