// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fanout.*` methods.

use hq_core::AgentProvider;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::rpc::{params, result, MethodTable, RpcContext, RpcError};

/// Upper bound on one fan-out burst.
const MAX_FANOUT: u32 = 16;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunParams {
    prompt: String,
    count: u32,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    runtime: Option<String>,
}

pub fn register(table: &mut MethodTable) {
    table.register("fanout.run", run);
}

/// Spawn `count` researcher agents and send them all the same prompt.
async fn run(raw: Value, ctx: Arc<RpcContext>) -> Result<Value, RpcError> {
    let p: RunParams = params(raw)?;
    if p.count == 0 || p.count > MAX_FANOUT {
        return Err(RpcError::invalid_params(format!(
            "count must be 1-{MAX_FANOUT}, got {}",
            p.count
        )));
    }
    let ids = ctx
        .orchestrator
        .fanout(p.prompt, p.count, p.provider.as_deref().map(AgentProvider::parse), p.runtime)
        .await?;
    result(&ids)
}
