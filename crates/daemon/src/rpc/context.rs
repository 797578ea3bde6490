// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared handler context: the worker's components, wired once at startup
//! and passed to every method (no module-local singletons).

use hq_adapters::RuntimeManager;
use hq_core::{Config, SystemClock};
use hq_storage::Store;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;

use crate::event_bus::EventBus;
use crate::kanban::Kanban;
use crate::orchestrator::OrchestratorHandle;
use crate::pipeline::PipelineEngine;

pub struct RpcContext {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub bus: EventBus,
    pub runtimes: Arc<RuntimeManager>,
    pub orchestrator: OrchestratorHandle,
    pub kanban: Arc<Kanban<SystemClock>>,
    pub engine: Arc<PipelineEngine<SystemClock>>,
    pub started_at: Instant,
    /// Worker shutdown signal, fired by `daemon.shutdown`.
    pub shutdown: Arc<Notify>,
}

impl RpcContext {
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
