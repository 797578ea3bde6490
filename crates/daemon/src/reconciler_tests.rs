// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use hq_adapters::{FakeRuntime, RuntimeAdapter, SpawnSpec};
use hq_core::{AgentId, AgentInstance, AgentProvider, AgentRole, Location, Task};
use hq_storage::FileStore;

use crate::event_bus::EventBus;

struct Harness {
    store: Arc<dyn Store>,
    runtimes: Arc<RuntimeManager>,
    orchestrator: OrchestratorHandle,
    fake: FakeRuntime,
    bus: EventBus,
}

fn harness() -> Harness {
    let fake = FakeRuntime::new("local");
    let runtimes = Arc::new(RuntimeManager::with_adapters(
        vec![Arc::new(fake.clone())],
        Some("local".to_string()),
    ));
    let store: Arc<dyn Store> = Arc::new(FileStore::in_memory());
    let bus = EventBus::new();
    let orchestrator = crate::orchestrator::spawn(
        Arc::clone(&store),
        Arc::clone(&runtimes),
        bus.clone(),
        hq_core::SystemClock,
    );
    Harness { store, runtimes, orchestrator, fake, bus }
}

/// Persist an agent record pointing at a session the fake may or may not
/// still have (simulates state left behind by a previous worker).
async fn persisted_agent(h: &Harness, id: &str, state: AgentState, live: bool) -> AgentInstance {
    let agent_id = AgentId::from_string(id);
    let location = if live {
        let spec = SpawnSpec::new(agent_id.clone(), "claude");
        h.fake.spawn_agent(&spec).await.unwrap()
    } else {
        Location::Pane { session: format!("fake-{id}"), window: 0, pane: 0 }
    };
    let now = Utc::now();
    let agent = AgentInstance {
        id: agent_id,
        template_id: None,
        name: id.to_string(),
        role: AgentRole::Coder,
        provider: AgentProvider::Claude,
        state,
        runtime_id: "local".to_string(),
        location,
        team_id: None,
        current_task_id: None,
        created_at: now,
        last_activity_at: now,
        error_message: None,
    };
    h.store.put_agent(&agent).unwrap();
    agent
}

#[tokio::test]
async fn reconnects_live_agents_and_loses_dead_ones() {
    let h = harness();
    persisted_agent(&h, "agt-alive", AgentState::Working, true).await;
    persisted_agent(&h, "agt-dead", AgentState::Idle, false).await;
    persisted_agent(&h, "agt-done", AgentState::Completed, false).await;

    let mut rx = h.bus.watch();
    let summary = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();

    // Terminal agents are not part of the sweep
    assert_eq!(summary.total, 2);
    assert_eq!(summary.reconnected, 1);
    assert_eq!(summary.lost, 1);

    let alive = h.store.get_agent("agt-alive").unwrap().unwrap();
    assert_eq!(alive.state, AgentState::Idle);
    assert!(h.orchestrator.get_agent("agt-alive").is_some());

    let dead = h.store.get_agent("agt-dead").unwrap().unwrap();
    assert_eq!(dead.state, AgentState::Error);
    assert_eq!(dead.error_message.as_deref(), Some("lost during reconciliation"));

    let wire = rx.recv().await.unwrap();
    assert_eq!(wire.name, "agent.reconnected");
    assert_eq!(wire.payload["id"], "agt-alive");
}

#[tokio::test]
async fn lost_agent_task_reverts_to_pending() {
    let h = harness();
    let task = Task::new("interrupted work", Utc::now());
    let task_id = task.id.clone();

    let mut agent = persisted_agent(&h, "agt-dead", AgentState::Working, false).await;
    agent.current_task_id = Some(task_id.clone());
    h.store.put_agent(&agent).unwrap();

    let mut task = task;
    task.assigned_agent_id = Some(agent.id.clone());
    task.set_status(hq_core::TaskStatus::InProgress, Utc::now());
    h.store.put_task(&task).unwrap();

    let summary = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();
    assert_eq!(summary.lost, 1);

    let task = h.store.get_task(task_id.as_str()).unwrap().unwrap();
    assert_eq!(task.status, hq_core::TaskStatus::Pending);
    assert_eq!(task.assigned_agent_id, None);

    let agent = h.store.get_agent("agt-dead").unwrap().unwrap();
    assert_eq!(agent.current_task_id, None);
}

#[tokio::test]
async fn missing_runtime_marks_agent_error() {
    let h = harness();
    let mut agent = persisted_agent(&h, "agt-orphan", AgentState::Idle, false).await;
    agent.runtime_id = "decommissioned".to_string();
    h.store.put_agent(&agent).unwrap();

    let summary = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();
    assert_eq!(summary.lost, 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains("no longer configured"));

    let agent = h.store.get_agent("agt-orphan").unwrap().unwrap();
    assert_eq!(agent.state, AgentState::Error);
    assert_eq!(agent.error_message.as_deref(), Some("runtime no longer configured"));
}

#[tokio::test]
async fn reconcile_twice_is_idempotent() {
    let h = harness();
    persisted_agent(&h, "agt-alive", AgentState::Working, true).await;
    persisted_agent(&h, "agt-dead", AgentState::Idle, false).await;

    let first = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();
    assert_eq!((first.reconnected, first.lost), (1, 1));
    let state_after_first: Vec<_> = {
        let mut agents = h.store.list_agents().unwrap();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents.into_iter().map(|a| (a.id, a.state, a.error_message)).collect()
    };

    // Second run: the live agent reconnects again, the lost one stays in
    // error and is no longer counted as non-terminal work to undo
    let second = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();
    let state_after_second: Vec<_> = {
        let mut agents = h.store.list_agents().unwrap();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents.into_iter().map(|a| (a.id, a.state, a.error_message)).collect()
    };
    assert_eq!(state_after_first, state_after_second);
    assert_eq!(second.reconnected + second.lost, second.total);
}

#[tokio::test]
async fn empty_store_reconciles_to_empty_summary() {
    let h = harness();
    let summary = reconcile(&h.store, &h.runtimes, &h.orchestrator).await.unwrap();
    assert_eq!(summary.total, 0);
    assert_eq!(summary.reconnected, 0);
    assert_eq!(summary.lost, 0);
    assert!(summary.errors.is_empty());
}
