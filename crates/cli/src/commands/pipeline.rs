// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `hq pipeline` - pipeline definitions and runs.

use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::CommandContext;
use crate::output::{format_or_json, print_table};

#[derive(Subcommand)]
pub enum PipelineCommand {
    /// List pipeline definitions
    List,
    /// Create a pipeline from a JSON file ({"name": ..., "stages": [...]})
    Create {
        /// Path to the pipeline definition
        file: PathBuf,
    },
    /// Start a run of a pipeline
    Run { id: String },
    /// Show a run's status and stage results
    Status { run: String },
    /// List active runs
    Active,
    /// Pause a running run
    Pause { run: String },
    /// Resume a paused run
    Resume { run: String },
    /// Cancel a run and its in-flight tasks
    Cancel { run: String },
}

pub async fn run(command: PipelineCommand, ctx: &CommandContext) -> Result<()> {
    match command {
        PipelineCommand::List => {
            let pipelines = ctx.client.call("pipeline.list", json!({})).await?;
            format_or_json(ctx.json, &pipelines, || {
                print_table(
                    pipelines.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[("ID", "id"), ("NAME", "name"), ("VERSION", "version")],
                );
            })
        }
        PipelineCommand::Create { file } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| anyhow!("cannot read {}: {e}", file.display()))?;
            let definition: Value = serde_json::from_str(&text)?;
            let pipeline = ctx.client.call("pipeline.create", definition).await?;
            format_or_json(ctx.json, &pipeline, || {
                println!("Pipeline created: {}", pipeline["id"].as_str().unwrap_or("-"));
            })
        }
        PipelineCommand::Run { id } => {
            let run = ctx.client.call("pipeline.run", json!({ "id": id })).await?;
            format_or_json(ctx.json, &run, || {
                println!(
                    "Run {} ({})",
                    run["id"].as_str().unwrap_or("-"),
                    run["status"].as_str().unwrap_or("-")
                );
            })
        }
        PipelineCommand::Status { run } => {
            let status = ctx.client.call("pipeline.getStatus", json!({ "run": run })).await?;
            format_or_json(ctx.json, &status, || {
                println!("Run: {}", status["id"].as_str().unwrap_or("-"));
                println!("Status: {}", status["status"].as_str().unwrap_or("-"));
                if let Some(results) = status["stageResults"].as_object() {
                    for (stage, result) in results {
                        println!("  {stage}: {}", result["status"].as_str().unwrap_or("-"));
                    }
                }
            })
        }
        PipelineCommand::Active => {
            let runs = ctx.client.call("pipeline.getActive", json!({})).await?;
            format_or_json(ctx.json, &runs, || {
                print_table(
                    runs.as_array().map(Vec::as_slice).unwrap_or_default(),
                    &[("ID", "id"), ("PIPELINE", "pipelineId"), ("STATUS", "status")],
                );
            })
        }
        PipelineCommand::Pause { run } => verb(ctx, "pipeline.pause", run).await,
        PipelineCommand::Resume { run } => verb(ctx, "pipeline.resume", run).await,
        PipelineCommand::Cancel { run } => verb(ctx, "pipeline.cancel", run).await,
    }
}

async fn verb(ctx: &CommandContext, method: &str, run: String) -> Result<()> {
    let result = ctx.client.call(method, json!({ "run": run })).await?;
    format_or_json(ctx.json, &result, || {
        println!(
            "Run {}: {}",
            result["id"].as_str().unwrap_or("-"),
            result["status"].as_str().unwrap_or("-")
        );
    })
}
