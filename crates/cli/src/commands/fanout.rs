// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq fanout` - spawn N researchers on one prompt.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::agent::strip_nulls;
use super::CommandContext;
use crate::output::format_or_json;

#[derive(Args)]
pub struct FanoutArgs {
    /// Prompt delivered to every spawned agent
    pub prompt: String,
    /// Number of agents to spawn
    #[arg(short = 'n', long, default_value = "3")]
    pub count: u32,
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub runtime: Option<String>,
}

pub async fn run(args: FanoutArgs, ctx: &CommandContext) -> Result<()> {
    let params = strip_nulls(json!({
        "prompt": args.prompt,
        "count": args.count,
        "provider": args.provider,
        "runtime": args.runtime,
    }));
    let ids = ctx.client.call("fanout.run", params).await?;
    format_or_json(ctx.json, &ids, || {
        println!("Spawned {} agents:", ids.as_array().map(Vec::len).unwrap_or(0));
        for id in ids.as_array().cloned().unwrap_or_default() {
            println!("  {}", id.as_str().unwrap_or("-"));
        }
    })
}
