// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq` - CLI front-end for the hq daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "hq", version, about = "Orchestrate AI CLI agents")]
struct Cli {
    /// Config file (TOML); defaults are used when absent
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon lifecycle (start, stop, status, logs)
    #[command(subcommand)]
    Daemon(commands::daemon::DaemonCommand),
    /// Manage agents (list, spawn, kill, prompt, output, attach)
    #[command(subcommand)]
    Agent(commands::agent::AgentCommand),
    /// Manage tasks (list, submit, move, cancel, complete)
    #[command(subcommand)]
    Task(commands::task::TaskCommand),
    /// Kanban board and swimlanes
    #[command(subcommand)]
    Kanban(commands::kanban::KanbanCommand),
    /// Pipelines and runs
    #[command(subcommand)]
    Pipeline(commands::pipeline::PipelineCommand),
    /// Configured runtimes
    #[command(subcommand)]
    Runtime(commands::runtime::RuntimeCommand),
    /// Agent teams
    #[command(subcommand)]
    Team(commands::team::TeamCommand),
    /// Spawn N researchers on one prompt
    Fanout(commands::fanout::FanoutArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<hq_core::Config> {
    Ok(match path {
        Some(path) => hq_core::Config::load(path)?,
        None => hq_core::Config::parse("")?,
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hq: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    let ctx = commands::CommandContext {
        client: client::DaemonClient::new(config.socket_path()),
        config,
        config_path: cli.config.clone(),
        json: cli.json,
    };

    match cli.command {
        Command::Daemon(command) => commands::daemon::run(command, &ctx).await,
        Command::Agent(command) => commands::agent::run(command, &ctx).await,
        Command::Task(command) => commands::task::run(command, &ctx).await,
        Command::Kanban(command) => commands::kanban::run(command, &ctx).await,
        Command::Pipeline(command) => commands::pipeline::run(command, &ctx).await,
        Command::Runtime(command) => commands::runtime::run(command, &ctx).await,
        Command::Team(command) => commands::team::run(command, &ctx).await,
        Command::Fanout(args) => commands::fanout::run(args, &ctx).await,
    }
}
