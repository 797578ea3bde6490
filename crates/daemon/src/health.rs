// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Component-level health report, served by `/health` and `daemon.health`.

use hq_adapters::HealthReport as RuntimeHealth;
use serde::Serialize;
use std::collections::HashMap;

/// Daemon-wide health rollup. `degraded` as soon as any runtime probe is
/// unhealthy; the daemon itself answering makes everything else `ok`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub components: ComponentHealth,
    pub runtimes: HashMap<String, RuntimeHealth>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub store: &'static str,
    pub event_bus_subscribers: usize,
    pub agents: usize,
    pub tasks: usize,
    pub active_runs: usize,
}

impl HealthSnapshot {
    pub fn build(
        uptime_secs: u64,
        components: ComponentHealth,
        runtimes: HashMap<String, RuntimeHealth>,
    ) -> Self {
        let degraded = runtimes.values().any(|r| !r.status.is_healthy());
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs,
            components,
            runtimes,
        }
    }
}

/// Counters reported by `daemon.stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub events_published: u64,
    pub agents_total: usize,
    pub agents_working: usize,
    pub tasks_total: usize,
    pub tasks_done: usize,
    pub lanes: usize,
    pub teams: usize,
    pub pipelines: usize,
    pub runs_active: usize,
}
