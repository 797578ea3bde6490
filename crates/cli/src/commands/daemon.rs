// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq daemon` - daemon lifecycle commands.

use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use serde_json::Value;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::Command;

use super::CommandContext;
use crate::output::format_or_json;

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Check daemon status and health
    Status,
    /// Stop and start the daemon
    Restart,
    /// Show recent daemon log lines
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "200")]
        limit: usize,
    },
}

pub async fn run(command: DaemonCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        DaemonCommand::Start => start(ctx).await,
        DaemonCommand::Stop => stop(ctx),
        DaemonCommand::Status => status(ctx).await,
        DaemonCommand::Restart => {
            let _ = stop(ctx);
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            start(ctx).await
        }
        DaemonCommand::Logs { limit } => logs(ctx, limit),
    }
}

fn hqd_args(ctx: &CommandContext, verb: &str) -> Vec<String> {
    let mut args = vec![verb.to_string()];
    if let Some(path) = &ctx.config_path {
        args.push("--config".to_string());
        args.push(path.display().to_string());
    }
    args
}

async fn start(ctx: &CommandContext) -> Result<()> {
    if ctx.client.is_up().await {
        println!("Daemon already running");
        return Ok(());
    }
    let status = Command::new(find_hqd_binary()?).args(hqd_args(ctx, "start")).status()?;
    if !status.success() {
        bail!("daemon failed to start");
    }
    Ok(())
}

fn stop(ctx: &CommandContext) -> Result<()> {
    let status = Command::new(find_hqd_binary()?).args(hqd_args(ctx, "stop")).status()?;
    if !status.success() {
        bail!("daemon failed to stop");
    }
    Ok(())
}

async fn status(ctx: &CommandContext) -> Result<()> {
    let health = match ctx.client.call("daemon.health", Value::Null).await {
        Ok(health) => health,
        Err(_) => {
            let obj = serde_json::json!({ "status": "not_running" });
            return format_or_json(ctx.json, &obj, || println!("Daemon not running"));
        }
    };

    format_or_json(ctx.json, &health, || {
        println!("Status: {}", health["status"].as_str().unwrap_or("unknown"));
        println!("Version: {}", health["version"].as_str().unwrap_or("unknown"));
        println!("Uptime: {}s", health["uptimeSecs"].as_u64().unwrap_or(0));
        if let Some(runtimes) = health["runtimes"].as_object() {
            for (id, report) in runtimes {
                println!(
                    "Runtime {}: {}",
                    id,
                    report["status"].as_str().unwrap_or("unknown")
                );
            }
        }
    })
}

fn logs(ctx: &CommandContext, limit: usize) -> Result<()> {
    let path = ctx.config.log_file();
    if !path.exists() {
        println!("No log file found at {}", path.display());
        return Ok(());
    }
    let file = std::fs::File::open(&path)?;
    let lines: Vec<String> = BufReader::new(file).lines().collect::<std::io::Result<_>>()?;
    let start = lines.len().saturating_sub(limit);
    for line in &lines[start..] {
        println!("{line}");
    }
    Ok(())
}

/// Locate the daemon binary: next to this executable, then on PATH.
fn find_hqd_binary() -> Result<PathBuf> {
    let current_exe =
        std::env::current_exe().map_err(|e| anyhow!("could not locate hq binary: {e}"))?;
    if let Some(dir) = current_exe.parent() {
        let sibling = dir.join("hqd");
        if sibling.exists() {
            return Ok(sibling);
        }
    }
    Ok(PathBuf::from("hqd"))
}
