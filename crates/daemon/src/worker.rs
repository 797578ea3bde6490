// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker kernel: composition root and main loop.
//!
//! Everything is constructed here and handed down as arguments — no
//! module-local singletons. Order matters: store → bus → runtimes →
//! orchestrator → kanban → engine → reconciler → router → transports.
//! The reconciler finishes before any transport accepts external RPC.

use hq_adapters::RuntimeManager;
use hq_core::{Config, Event, SystemClock};
use hq_storage::{FileStore, Store, StoreError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::event_bus::EventBus;
use crate::kanban::Kanban;
use crate::logger;
use crate::orchestrator;
use crate::pipeline::PipelineEngine;
use crate::reconciler;
use crate::rpc::{Router, RpcContext};
use crate::transport;

/// How long a done task with `autoClose` lingers before its session is
/// killed and the task archived.
const AUTO_CLOSE_GRACE: Duration = Duration::from_secs(60);

/// Cadence of the orchestrator's assignment tick.
const ASSIGN_TICK: Duration = Duration::from_secs(2);

/// Cadence of the auto-close sweeper.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("logger: {0}")]
    Logger(#[from] logger::LoggerError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("transport: {0}")]
    Transport(#[from] transport::TransportError),
    #[error("signals: {0}")]
    Signals(#[source] std::io::Error),
}

/// Run the worker until a termination signal or `daemon.shutdown`.
pub async fn run(config: Config) -> Result<(), WorkerError> {
    let _log_guard = logger::init(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "worker starting");

    let store: Arc<dyn Store> = Arc::new(FileStore::open(config.db_file())?);
    let bus = EventBus::new();
    let runtimes = Arc::new(RuntimeManager::from_config(&config));
    let orchestrator = orchestrator::spawn(
        Arc::clone(&store),
        Arc::clone(&runtimes),
        bus.clone(),
        SystemClock,
    );
    let kanban = Arc::new(Kanban::new(Arc::clone(&store), bus.clone(), SystemClock));
    let engine = Arc::new(PipelineEngine::new(
        Arc::clone(&store),
        bus.clone(),
        orchestrator.clone(),
        SystemClock,
    ));

    // Reconcile persisted agents before accepting external RPC
    if config.daemon.reconcile_on_start {
        let summary = reconciler::reconcile(&store, &runtimes, &orchestrator).await?;
        info!(
            total = summary.total,
            reconnected = summary.reconnected,
            lost = summary.lost,
            "startup reconciliation done"
        );
    }

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(RpcContext {
        config: config.clone(),
        store: Arc::clone(&store),
        bus: bus.clone(),
        runtimes: Arc::clone(&runtimes),
        orchestrator: orchestrator.clone(),
        kanban: Arc::clone(&kanban),
        engine: Arc::clone(&engine),
        started_at: Instant::now(),
        shutdown: Arc::clone(&shutdown),
    });
    let router = Arc::new(Router::new(ctx));

    // The engine wakes on finished tasks; the bus is the only back-channel
    let (engine_tx, engine_rx) = mpsc::channel(256);
    bus.subscribe(None, move |event| {
        let id = match event {
            Event::TaskCompleted { id, .. } | Event::TaskCancelled { id } => id.clone(),
            _ => return Ok(()),
        };
        engine_tx.try_send(id).map_err(|e| format!("engine wake failed: {e}"))
    });
    let engine_loop = tokio::spawn(Arc::clone(&engine).run_loop(engine_rx));

    let mut tasks = transport::start(&config, Arc::clone(&router)).await?;
    tasks.push(engine_loop);
    tasks.push(spawn_probe_loop(
        Arc::clone(&runtimes),
        bus.clone(),
        config.health_check_interval(),
    ));
    tasks.push(spawn_assign_ticker(orchestrator.clone()));
    tasks.push(spawn_auto_close_sweeper(Arc::clone(&kanban), orchestrator.clone()));

    // Parent (supervisor) watches for this marker on first start
    println!("READY");
    info!("worker ready");

    let mut sigterm = signal(SignalKind::terminate()).map_err(WorkerError::Signals)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(WorkerError::Signals)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(WorkerError::Signals)?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("worker received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("worker received SIGINT, shutting down");
                break;
            }
            _ = sighup.recv() => {
                info!("worker received SIGHUP");
                bus.publish(Event::DaemonReloaded);
            }
            _ = shutdown.notified() => {
                info!("shutdown requested via rpc");
                break;
            }
        }
    }

    for task in tasks {
        task.abort();
    }
    let socket_path = config.socket_path();
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(&socket_path) {
            warn!(error = %e, "failed to remove socket file");
        }
    }
    info!("worker stopped");
    Ok(())
}

/// Periodic runtime health probe; health flips are published on the bus.
fn spawn_probe_loop(
    runtimes: Arc<RuntimeManager>,
    bus: EventBus,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(interval);
        loop {
            tick.tick().await;
            for (runtime_id, report) in runtimes.probe_all().await {
                bus.publish(Event::RuntimeHealthChanged {
                    runtime_id,
                    healthy: report.status.is_healthy(),
                });
            }
        }
    })
}

fn spawn_assign_ticker(
    orchestrator: crate::orchestrator::OrchestratorHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(ASSIGN_TICK);
        loop {
            tick.tick().await;
            orchestrator.tick();
        }
    })
}

/// Kill the sessions of auto-closed tasks once their grace window elapses.
fn spawn_auto_close_sweeper(
    kanban: Arc<Kanban<SystemClock>>,
    orchestrator: crate::orchestrator::OrchestratorHandle,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            let swept = match kanban.sweep_auto_close(AUTO_CLOSE_GRACE) {
                Ok(swept) => swept,
                Err(e) => {
                    warn!(error = %e, "auto-close sweep failed");
                    continue;
                }
            };
            for (task_id, agent_id) in swept {
                let Some(agent_id) = agent_id else { continue };
                info!(task = %task_id, agent = %agent_id, "auto-closing agent session");
                if let Err(e) = orchestrator.kill_agent(agent_id).await {
                    warn!(task = %task_id, error = %e, "auto-close kill failed");
                }
            }
        }
    })
}
