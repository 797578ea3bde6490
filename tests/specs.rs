// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario tests, wiring real components with the fake
//! runtime (no tmux/docker/k8s needed).

use std::sync::Arc;
use std::time::{Duration, Instant};

use hq_adapters::{FakeRuntime, RuntimeManager};
use hq_core::{Config, SupervisorSection, SystemClock};
use hq_daemon::event_bus::EventBus;
use hq_daemon::kanban::Kanban;
use hq_daemon::orchestrator::{self, OrchestratorHandle, SpawnRequest};
use hq_daemon::pipeline::PipelineEngine;
use hq_daemon::rpc::{Router, RpcContext, RpcRequest};
use hq_daemon::supervisor::{RestartDecision, RestartPolicy};
use hq_storage::{FileStore, Store};
use serde_json::{json, Value};
use tokio::sync::Notify;

struct World {
    router: Router,
    orchestrator: OrchestratorHandle,
    store: Arc<dyn Store>,
    bus: EventBus,
    fake: FakeRuntime,
}

fn world() -> World {
    let fake = FakeRuntime::new("local");
    let runtimes = Arc::new(RuntimeManager::with_adapters(
        vec![Arc::new(fake.clone())],
        Some("local".to_string()),
    ));
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let bus = EventBus::new();
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
    let ctx = Arc::new(RpcContext {
        config: Config::parse("").unwrap(),
        store: Arc::clone(&store),
        bus: bus.clone(),
        runtimes,
        orchestrator: orchestrator.clone(),
        kanban,
        engine: Arc::clone(&engine),
        started_at: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    });

    // Same wiring as the worker: finished tasks wake the engine via the bus
    let (engine_tx, engine_rx) = tokio::sync::mpsc::channel(256);
    bus.subscribe(None, move |event| {
        let id = match event {
            hq_core::Event::TaskCompleted { id, .. }
            | hq_core::Event::TaskCancelled { id } => id.clone(),
            _ => return Ok(()),
        };
        engine_tx.try_send(id).map_err(|e| e.to_string())
    });
    tokio::spawn(engine.run_loop(engine_rx));

    World { router: Router::new(ctx), orchestrator, store, bus, fake }
}

fn rpc(method: &str, params: Value) -> RpcRequest {
    RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(1)),
        method: Some(method.to_string()),
        params: Some(params),
    }
}

// S1: spawn over RPC, agent settles and the spawn event fires.
#[tokio::test]
async fn s1_spawn_returns_spawning_then_settles() {
    let w = world();
    let mut events = w.bus.watch();

    let response = w
        .router
        .dispatch(rpc("agent.spawn", json!({"role": "coder", "task": "write hello"})))
        .await;
    let spawned = response.result.unwrap();
    assert_eq!(spawned["state"], "spawning");
    let id = spawned["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("agt-"));

    let response = w.router.dispatch(rpc("agent.get", json!({"id": id}))).await;
    let state = response.result.unwrap()["state"].as_str().unwrap().to_string();
    assert!(state == "idle" || state == "working", "unexpected state {state}");

    let wire = events.recv().await.unwrap();
    assert_eq!(wire.name, "agent.spawned");
    assert_eq!(wire.payload["id"], id.as_str());
}

// S2: lane default toggles stamp unset values; explicit false survives.
#[tokio::test]
async fn s2_toggle_inheritance_preserves_explicit_false() {
    let w = world();
    let response = w
        .router
        .dispatch(rpc(
            "kanban.createLane",
            json!({"name": "L", "defaultToggles": {"autoStart": true, "autoClose": true}}),
        ))
        .await;
    let lane = response.result.unwrap()["id"].as_str().unwrap().to_string();

    let response = w
        .router
        .dispatch(rpc(
            "kanban.createTask",
            json!({"description": "x", "swimLaneId": lane, "autoClose": false}),
        ))
        .await;
    let task = response.result.unwrap();
    assert_eq!(task["toggles"]["autoStart"], true);
    assert_eq!(task["toggles"]["autoClose"], false);
}

// S3: diamond pipeline with fan-out; D waits for B and all of C's children.
#[tokio::test]
async fn s3_pipeline_diamond_with_fan_out() {
    let w = world();
    let response = w
        .router
        .dispatch(rpc(
            "pipeline.create",
            json!({
                "name": "diamond",
                "stages": [
                    {"id": "a", "type": "sequential", "agentRole": "coder",
                     "taskDescription": "stage a"},
                    {"id": "b", "type": "parallel", "agentRole": "coder",
                     "taskDescription": "stage b", "dependsOn": ["a"]},
                    {"id": "c", "type": "fan_out", "agentRole": "researcher",
                     "taskDescription": "stage c", "dependsOn": ["a"], "fanOutCount": 3},
                    {"id": "d", "type": "sequential", "agentRole": "reviewer",
                     "taskDescription": "stage d", "dependsOn": ["b", "c"]},
                ],
            }),
        ))
        .await;
    let pipeline = response.result.unwrap()["id"].as_str().unwrap().to_string();

    let response = w.router.dispatch(rpc("pipeline.run", json!({"id": pipeline}))).await;
    let run = response.result.unwrap()["id"].as_str().unwrap().to_string();

    // Drive every live stage task to completion until the run finishes.
    // The engine reacts asynchronously through the bus, so poll between
    // rounds.
    for _ in 0..50 {
        let live: Vec<String> = w
            .store
            .tasks_for_run(&run)
            .unwrap()
            .into_iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id.as_str().to_string())
            .collect();
        for id in live {
            let response =
                w.router.dispatch(rpc("task.complete", json!({"id": id}))).await;
            assert!(response.error.is_none());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let run_state = w.store.get_run(&run).unwrap().unwrap();
        if run_state.status.is_terminal() {
            break;
        }
    }

    let response = w.router.dispatch(rpc("pipeline.getStatus", json!({"run": run}))).await;
    let status: hq_core::PipelineRun =
        serde_json::from_value(response.result.unwrap()).unwrap();
    assert_eq!(status.status, hq_core::RunStatus::Completed);
    for stage in ["a", "b", "c", "d"] {
        assert_eq!(
            status.stage_results[stage].status,
            hq_core::StageStatus::Completed,
            "stage {stage}"
        );
    }
    assert_eq!(status.stage_results["c"].branches_done, 3);

    // A completed before B/C started; D only after B and C completed
    let a_done = status.stage_results["a"].completed_at.unwrap();
    let b_start = status.stage_results["b"].started_at.unwrap();
    let d_start = status.stage_results["d"].started_at.unwrap();
    let b_done = status.stage_results["b"].completed_at.unwrap();
    let c_done = status.stage_results["c"].completed_at.unwrap();
    assert!(a_done <= b_start);
    assert!(b_done <= d_start);
    assert!(c_done <= d_start);
}

// S4: persisted agents are reconciled after a restart, no duplicates.
#[tokio::test]
async fn s4_reconcile_after_worker_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.snapshot");

    let fake = FakeRuntime::new("local");
    let runtimes = Arc::new(RuntimeManager::with_adapters(
        vec![Arc::new(fake.clone())],
        Some("local".to_string()),
    ));

    // First worker lifetime: two working agents
    let (first_a, first_b) = {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(db.clone()).unwrap());
        let bus = EventBus::new();
        let orchestrator =
            orchestrator::spawn(Arc::clone(&store), Arc::clone(&runtimes), bus, SystemClock);
        let a = orchestrator
            .spawn_agent(SpawnRequest {
                role: Some(hq_core::AgentRole::Coder),
                task: Some("job a".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let b = orchestrator
            .spawn_agent(SpawnRequest {
                role: Some(hq_core::AgentRole::Coder),
                task: Some("job b".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        (a.id, b.id)
    };

    // One backend session died while "the daemon was down"
    fake.kill_session(&format!("fake-{}", first_b.as_str()));

    // Second worker lifetime over the same snapshot
    let store: Arc<dyn Store> = Arc::new(FileStore::open(db).unwrap());
    let bus = EventBus::new();
    let orchestrator =
        orchestrator::spawn(Arc::clone(&store), Arc::clone(&runtimes), bus, SystemClock);
    let summary =
        hq_daemon::reconciler::reconcile(&store, &runtimes, &orchestrator).await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.reconnected, 1);
    assert_eq!(summary.lost, 1);

    // No duplicate instances in the store
    assert_eq!(store.list_agents().unwrap().len(), 2);
    let alive = store.get_agent(first_a.as_str()).unwrap().unwrap();
    assert_eq!(alive.state, hq_core::AgentState::Idle);
    let lost = store.get_agent(first_b.as_str()).unwrap().unwrap();
    assert_eq!(lost.state, hq_core::AgentState::Error);
}

// S5: the circuit breaker allows maxRestarts, opens, then resumes.
#[test]
fn s5_circuit_breaker_burst() {
    let section = SupervisorSection { max_restarts: 5, restart_window: 30, restart_backoff: 60 };
    let mut policy = RestartPolicy::new(&section);
    let start = Instant::now();

    let mut restarts = 0;
    let mut open_at = None;
    for n in 0..10u64 {
        match policy.record_exit(start + Duration::from_secs(n)) {
            RestartDecision::Restart if open_at.is_none() => restarts += 1,
            RestartDecision::Restart => {}
            RestartDecision::Open(backoff) => {
                assert_eq!(backoff, Duration::from_secs(60));
                open_at.get_or_insert(n);
            }
        }
    }
    assert_eq!(restarts, 5);
    assert_eq!(open_at, Some(5));

    // After the backoff, restarts resume
    let resumed = policy.record_exit(start + Duration::from_secs(5 + 61));
    assert_eq!(resumed, RestartDecision::Restart);
}

// S6: two subscribers see 100 events in publish order, no duplicates.
#[tokio::test]
async fn s6_event_ordering_across_subscribers() {
    let w = world();
    let mut rx_a = w.bus.watch();
    let mut rx_b = w.bus.watch();

    for n in 0..100u32 {
        w.bus.publish(hq_core::Event::TaskMoved {
            id: hq_core::TaskId::from_string(format!("tsk-{n}")),
            column: hq_core::KanbanColumn::Done,
        });
    }

    for rx in [&mut rx_a, &mut rx_b] {
        let mut seen = Vec::new();
        for _ in 0..100 {
            let wire = rx.recv().await.unwrap();
            assert_eq!(wire.name, "task.moved");
            seen.push(wire.payload["id"].as_str().unwrap().to_string());
        }
        let expected: Vec<String> = (0..100).map(|n| format!("tsk-{n}")).collect();
        assert_eq!(seen, expected);
    }
}

// Config round-trip over RPC mirrors the file round-trip property.
#[tokio::test]
async fn daemon_config_round_trips() {
    let w = world();
    let response = w.router.dispatch(rpc("daemon.config", Value::Null)).await;
    let exposed = response.result.unwrap();
    let reparsed: Config = serde_json::from_value(exposed).unwrap();
    assert_eq!(reparsed, Config::parse("").unwrap());
}

// Kill twice lands in the same terminal state (idempotence).
#[tokio::test]
async fn agent_kill_is_idempotent_end_to_end() {
    let w = world();
    let reply = w
        .orchestrator
        .spawn_agent(SpawnRequest {
            role: Some(hq_core::AgentRole::Coder),
            ..Default::default()
        })
        .await
        .unwrap();

    for _ in 0..2 {
        let response =
            w.router.dispatch(rpc("agent.kill", json!({"id": reply.id.as_str()}))).await;
        assert!(response.error.is_none());
        let agent = w.orchestrator.get_agent(reply.id.as_str()).unwrap();
        assert_eq!(agent.state, hq_core::AgentState::Terminated);
    }
    // Exactly one kill reached the backend; the second was a no-op
    let kills = w
        .fake
        .calls()
        .iter()
        .filter(|c| matches!(c, hq_adapters::FakeCall::Kill { .. }))
        .count();
    assert_eq!(kills, 1);
}

// Moving a task to the same column twice is the same as moving once.
#[tokio::test]
async fn task_move_is_idempotent() {
    let w = world();
    let response =
        w.router.dispatch(rpc("task.submit", json!({"description": "x"}))).await;
    let task = response.result.unwrap();
    let id = task["id"].as_str().unwrap().to_string();

    let first = w
        .router
        .dispatch(rpc("task.move", json!({"id": id, "column": "in_review"})))
        .await
        .result
        .unwrap();
    let second = w
        .router
        .dispatch(rpc("task.move", json!({"id": id, "column": "in_review"})))
        .await
        .result
        .unwrap();
    assert_eq!(first, second);
}

// Done column forces a terminal status (invariant 1).
#[tokio::test]
async fn done_column_forces_terminal_status() {
    let w = world();
    let response =
        w.router.dispatch(rpc("task.submit", json!({"description": "x"}))).await;
    let id = response.result.unwrap()["id"].as_str().unwrap().to_string();

    let moved = w
        .router
        .dispatch(rpc("task.move", json!({"id": id, "column": "done"})))
        .await
        .result
        .unwrap();
    assert!(moved["status"] == "completed" || moved["status"] == "failed");
}

// Working agents always point at their task and vice versa (invariant 2).
#[tokio::test]
async fn working_agent_and_task_point_at_each_other() {
    let w = world();
    let reply = w
        .orchestrator
        .spawn_agent(SpawnRequest {
            role: Some(hq_core::AgentRole::Coder),
            task: Some("mutual".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let agent = w.orchestrator.get_agent(reply.id.as_str()).unwrap();
    assert_eq!(agent.state, hq_core::AgentState::Working);
    let task_id = agent.current_task_id.clone().unwrap();
    let task = w.store.get_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(task.assigned_agent_id, Some(agent.id));
}
