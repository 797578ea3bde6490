// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq runtime` - configured runtime backends.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use super::CommandContext;
use crate::output::{format_or_json, print_table};

#[derive(Subcommand)]
pub enum RuntimeCommand {
    /// List runtimes with their last health verdict
    List,
    /// Probe a runtime and report latency
    Ping { id: String },
    /// Remove a runtime (refused while agents live on it)
    Remove { id: String },
}

pub async fn run(command: RuntimeCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        RuntimeCommand::List => {
            let runtimes = ctx.client.call("runtime.list", json!({})).await?;
            format_or_json(ctx.json, &runtimes, || {
                print_table(
                    runtimes.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[("ID", "id"), ("TYPE", "type"), ("DEFAULT", "default")],
                );
            })
        }
        RuntimeCommand::Ping { id } => {
            let ping = ctx.client.call("runtime.ping", json!({ "id": id })).await?;
            format_or_json(ctx.json, &ping, || {
                println!(
                    "{}: {} ({}ms)",
                    id,
                    ping["status"].as_str().unwrap_or("unknown"),
                    ping["latency"].as_u64().unwrap_or(0)
                );
            })
        }
        RuntimeCommand::Remove { id } => {
            ctx.client.call("runtime.remove", json!({ "id": id })).await?;
            println!("Runtime removed: {id}");
            Ok(())
        }
    }
}
