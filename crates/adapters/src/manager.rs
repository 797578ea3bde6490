// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime manager: one adapter per configured runtime, a health cache,
//! and the selection chain for new spawns.

use hq_core::{Config, RuntimeConfig, RuntimeKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::{
    AdapterError, DockerAdapter, HealthReport, HealthStatus, K8sAdapter, RuntimeAdapter,
    TmuxAdapter,
};

/// Holds the configured runtime adapters and their last probe results.
/// Adapters can be added and removed at runtime (`runtime.add/remove`).
pub struct RuntimeManager {
    adapters: RwLock<HashMap<String, Arc<dyn RuntimeAdapter>>>,
    default_id: Option<String>,
    health: RwLock<HashMap<String, HealthReport>>,
}

impl RuntimeManager {
    /// Build adapters for every `[runtime.<id>]` entry in the config.
    pub fn from_config(config: &Config) -> Self {
        let mut adapters: HashMap<String, Arc<dyn RuntimeAdapter>> = HashMap::new();
        for (id, runtime) in &config.runtime {
            adapters.insert(id.clone(), Self::build_adapter(id, runtime));
        }
        Self {
            adapters: RwLock::new(adapters),
            default_id: config.default_runtime().map(str::to_string),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// Build one adapter from a config entry.
    pub fn build_adapter(id: &str, runtime: &RuntimeConfig) -> Arc<dyn RuntimeAdapter> {
        match &runtime.kind {
            RuntimeKind::LocalTmux { session_prefix } => {
                Arc::new(TmuxAdapter::local(id, session_prefix.clone()))
            }
            RuntimeKind::Docker { image } => Arc::new(DockerAdapter::new(id, image.clone())),
            RuntimeKind::K8s { namespace, image } => {
                Arc::new(K8sAdapter::new(id, namespace, image.clone()))
            }
            RuntimeKind::Ssh { remote } => Arc::new(TmuxAdapter::remote(id, remote.clone())),
        }
    }

    /// Register a runtime; replaces any existing adapter with the same id.
    pub fn add(&self, id: &str, runtime: &RuntimeConfig) {
        let adapter = Self::build_adapter(id, runtime);
        self.adapters.write().insert(id.to_string(), adapter);
        self.health.write().remove(id);
    }

    /// Deregister a runtime. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.health.write().remove(id);
        self.adapters.write().remove(id).is_some()
    }

    /// Build from pre-made adapters (tests, embedded use).
    pub fn with_adapters(
        adapters: Vec<Arc<dyn RuntimeAdapter>>,
        default_id: Option<String>,
    ) -> Self {
        let adapters =
            adapters.into_iter().map(|a| (a.id().to_string(), a)).collect::<HashMap<_, _>>();
        Self { adapters: RwLock::new(adapters), default_id, health: RwLock::new(HashMap::new()) }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn RuntimeAdapter>> {
        self.adapters.read().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.adapters.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn default_id(&self) -> Option<&str> {
        self.default_id.as_deref()
    }

    /// Pick the runtime for a new spawn: explicit request, then the
    /// template's preferred runtime, then the configured default, then the
    /// first healthy adapter.
    pub fn select(
        &self,
        explicit: Option<&str>,
        preferred: Option<&str>,
    ) -> Result<Arc<dyn RuntimeAdapter>, AdapterError> {
        if let Some(id) = explicit {
            return self.get(id).ok_or_else(|| {
                AdapterError::NoRuntime(format!("runtime {id} is not configured"))
            });
        }
        if let Some(adapter) = preferred.and_then(|id| self.get(id)) {
            return Ok(adapter);
        }
        if let Some(adapter) = self.default_id.as_deref().and_then(|id| self.get(id)) {
            return Ok(adapter);
        }
        let health = self.health.read();
        self.ids()
            .into_iter()
            .find(|id| {
                health.get(id).map(|h| h.status.is_healthy()).unwrap_or(true)
            })
            .and_then(|id| self.get(&id))
            .ok_or_else(|| AdapterError::NoRuntime("no healthy runtime configured".to_string()))
    }

    /// Whether the last probe considered the runtime healthy. Unknown
    /// runtimes (not yet probed) count as healthy.
    pub fn is_healthy(&self, id: &str) -> bool {
        self.health.read().get(id).map(|h| h.status.is_healthy()).unwrap_or(true)
    }

    /// Probe every adapter and refresh the cache. Returns the runtimes
    /// whose healthy/unhealthy verdict flipped.
    pub async fn probe_all(&self) -> Vec<(String, HealthReport)> {
        let mut changed = Vec::new();
        let adapters: Vec<(String, Arc<dyn RuntimeAdapter>)> = self
            .adapters
            .read()
            .iter()
            .map(|(id, a)| (id.clone(), Arc::clone(a)))
            .collect();
        for (id, adapter) in &adapters {
            let report = adapter.probe().await;
            let mut health = self.health.write();
            let flipped = match health.get(id) {
                Some(previous) => previous.status.is_healthy() != report.status.is_healthy(),
                None => report.status != HealthStatus::Healthy,
            };
            if flipped {
                info!(runtime = %id, status = %report.status, "runtime health changed");
                changed.push((id.clone(), report.clone()));
            }
            health.insert(id.clone(), report);
        }
        changed
    }

    /// Snapshot of the health cache for `daemon.health`.
    pub fn health_snapshot(&self) -> HashMap<String, HealthReport> {
        self.health.read().clone()
    }

    /// Probe one runtime and report round-trip latency in milliseconds.
    pub async fn ping(&self, id: &str) -> Result<(HealthReport, u64), AdapterError> {
        let adapter = self
            .get(id)
            .ok_or_else(|| AdapterError::NoRuntime(format!("runtime {id} is not configured")))?;
        let start = Instant::now();
        let report = adapter.probe().await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.health.write().insert(id.to_string(), report.clone());
        Ok((report, latency_ms))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
