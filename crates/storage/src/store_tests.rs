// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use hq_core::{
    AgentId, AgentProvider, AgentRole, AgentState, KanbanColumn, LaneId, Location, RunId,
    StageRef, TaskStatus,
};

fn agent(id: &str, state: AgentState) -> AgentInstance {
    let now = Utc::now();
    AgentInstance {
        id: AgentId::from_string(id),
        template_id: None,
        name: id.to_string(),
        role: AgentRole::Coder,
        provider: AgentProvider::Claude,
        state,
        runtime_id: "local".to_string(),
        location: Location::Pane { session: format!("hq-{id}"), window: 0, pane: 0 },
        team_id: None,
        current_task_id: None,
        created_at: now,
        last_activity_at: now,
        error_message: None,
    }
}

#[test]
fn agent_crud_round_trip() {
    let store = FileStore::in_memory();
    let a = agent("agt-1", AgentState::Idle);
    store.put_agent(&a).unwrap();

    assert_eq!(store.get_agent("agt-1").unwrap(), Some(a.clone()));
    assert_eq!(store.list_agents().unwrap().len(), 1);
    assert!(store.delete_agent("agt-1").unwrap());
    assert!(!store.delete_agent("agt-1").unwrap());
    assert_eq!(store.get_agent("agt-1").unwrap(), None);
}

#[test]
fn non_terminal_agents_skips_finished() {
    let store = FileStore::in_memory();
    store.put_agent(&agent("agt-idle", AgentState::Idle)).unwrap();
    store.put_agent(&agent("agt-done", AgentState::Completed)).unwrap();
    store.put_agent(&agent("agt-dead", AgentState::Terminated)).unwrap();
    store.put_agent(&agent("agt-err", AgentState::Error)).unwrap();

    let mut ids: Vec<_> = store
        .non_terminal_agents()
        .unwrap()
        .into_iter()
        .map(|a| a.id.as_str().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, ["agt-err", "agt-idle"]);
}

#[test]
fn task_queries_by_lane_and_run() {
    let store = FileStore::in_memory();
    let now = Utc::now();

    let mut in_lane = hq_core::Task::new("a", now);
    in_lane.lane_id = Some(LaneId::from_string("lane-1"));
    let mut in_run = hq_core::Task::new("b", now);
    in_run.stage_ref = Some(StageRef {
        run_id: RunId::from_string("run-1"),
        stage_id: "build".to_string(),
        branch: None,
    });
    let plain = hq_core::Task::new("c", now);

    for t in [&in_lane, &in_run, &plain] {
        store.put_task(t).unwrap();
    }

    let lane_tasks = store.tasks_in_lane("lane-1").unwrap();
    assert_eq!(lane_tasks.len(), 1);
    assert_eq!(lane_tasks[0].id, in_lane.id);

    let run_tasks = store.tasks_for_run("run-1").unwrap();
    assert_eq!(run_tasks.len(), 1);
    assert_eq!(run_tasks[0].id, in_run.id);
}

#[test]
fn rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.snapshot");

    {
        let store = FileStore::open(path.clone()).unwrap();
        store.put_agent(&agent("agt-1", AgentState::Working)).unwrap();
        let mut task = hq_core::Task::new("persisted", Utc::now());
        task.set_status(TaskStatus::Assigned, Utc::now());
        store.put_task(&task).unwrap();
    }

    let store = FileStore::open(path).unwrap();
    assert_eq!(store.list_agents().unwrap().len(), 1);
    let tasks = store.list_tasks().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Assigned);
    assert_eq!(tasks[0].column, KanbanColumn::Backlog);
}

#[test]
fn active_runs_filters_terminal() {
    let store = FileStore::in_memory();
    let now = Utc::now();
    let pipeline = hq_core::Pipeline::new(
        "p",
        vec![hq_core::Stage {
            id: "s".to_string(),
            name: "s".to_string(),
            stage_type: hq_core::StageType::Sequential,
            agent_role: AgentRole::Coder,
            task_description: "x".to_string(),
            depends_on: vec![],
            condition: None,
            fan_out_count: None,
            timeout_secs: None,
        }],
        now,
    );

    let mut running = hq_core::PipelineRun::new(&pipeline, now);
    running.status = hq_core::RunStatus::Running;
    let mut done = hq_core::PipelineRun::new(&pipeline, now);
    done.status = hq_core::RunStatus::Completed;

    store.put_run(&running).unwrap();
    store.put_run(&done).unwrap();

    let active = store.active_runs().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, running.id);
}
