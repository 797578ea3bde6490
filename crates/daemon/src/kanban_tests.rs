// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hq_core::{FakeClock, LaneToggles, Toggles};
use hq_storage::FileStore;

fn kanban() -> Kanban<FakeClock> {
    Kanban::new(Arc::new(FileStore::in_memory()), EventBus::new(), FakeClock::new())
}

fn lane_with_toggles(k: &Kanban<FakeClock>, toggles: LaneToggles) -> SwimLane {
    let mut lane = SwimLane::new("backend", "local", k.clock.now_utc());
    lane.default_toggles = toggles;
    k.create_lane(lane).unwrap()
}

#[test]
fn lane_defaults_stamped_only_for_unset() {
    let k = kanban();
    let lane = lane_with_toggles(
        &k,
        LaneToggles { auto_start: true, auto_close: true, ..Default::default() },
    );

    let task = k
        .create_task(NewTask {
            description: "x".to_string(),
            lane_id: Some(lane.id.clone()),
            toggles: Toggles { auto_close: Some(false), ..Default::default() },
            ..Default::default()
        })
        .unwrap();

    // autoStart inherited, explicit autoClose=false preserved
    assert_eq!(task.toggles.auto_start, Some(true));
    assert_eq!(task.toggles.auto_close, Some(false));

    let effective = k.effective_toggles(&task).unwrap();
    assert!(effective.auto_start);
    assert!(!effective.auto_close);
}

#[test]
fn later_lane_edits_do_not_mutate_stamped_tasks() {
    let k = kanban();
    let mut lane = lane_with_toggles(
        &k,
        LaneToggles { auto_start: true, ..Default::default() },
    );
    let task = k
        .create_task(NewTask {
            description: "x".to_string(),
            lane_id: Some(lane.id.clone()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(task.toggles.auto_start, Some(true));

    lane.default_toggles.auto_start = false;
    k.edit_lane(lane).unwrap();

    let effective = k.effective_toggles(&k.get_task(task.id.as_str()).unwrap()).unwrap();
    assert!(effective.auto_start, "stamped value must survive lane edits");
}

#[test]
fn move_to_done_forces_terminal_status() {
    let k = kanban();
    let task = k.create_task(NewTask { description: "x".to_string(), ..Default::default() }).unwrap();

    let moved = k.move_task(&task.id, KanbanColumn::Done).unwrap();
    assert_eq!(moved.status, TaskStatus::Completed);
    assert!(moved.done_at.is_some());

    // Idempotent: repeating the move changes nothing
    let again = k.move_task(&task.id, KanbanColumn::Done).unwrap();
    assert_eq!(again.status, TaskStatus::Completed);
    assert_eq!(again.status_history.len(), moved.status_history.len());
}

#[test]
fn failed_task_stays_failed_when_moved_to_done() {
    let k = kanban();
    let mut task =
        k.create_task(NewTask { description: "x".to_string(), ..Default::default() }).unwrap();
    task.set_status(TaskStatus::Failed, k.clock.now_utc());
    k.update_task(task.clone()).unwrap();

    let moved = k.move_task(&task.id, KanbanColumn::Done).unwrap();
    assert_eq!(moved.status, TaskStatus::Failed);
}

#[test]
fn moving_out_of_done_resets_assignment() {
    let k = kanban();
    let task = k.create_task(NewTask { description: "x".to_string(), ..Default::default() }).unwrap();
    k.move_task(&task.id, KanbanColumn::Done).unwrap();

    let back = k.move_task(&task.id, KanbanColumn::Todo).unwrap();
    assert_eq!(back.status, TaskStatus::Pending);
    assert_eq!(back.assigned_agent_id, None);
    assert_eq!(back.done_at, None);
}

#[test]
fn dependency_cycle_rejected_on_insert() {
    let k = kanban();
    let a = k.create_task(NewTask { description: "a".to_string(), ..Default::default() }).unwrap();
    let b = k
        .create_task(NewTask {
            description: "b".to_string(),
            depends_on: vec![a.id.clone()],
            ..Default::default()
        })
        .unwrap();

    // Completing the cycle a → b → a must be rejected
    let mut a_edit = k.get_task(a.id.as_str()).unwrap();
    a_edit.depends_on = vec![b.id.clone()];
    assert!(matches!(k.update_task(a_edit), Err(KanbanError::DependencyCycle(_))));

    // The store still holds the acyclic version
    assert!(k.get_task(a.id.as_str()).unwrap().depends_on.is_empty());
}

#[test]
fn unknown_dependency_rejected() {
    let k = kanban();
    let err = k
        .create_task(NewTask {
            description: "x".to_string(),
            depends_on: vec![hq_core::TaskId::from_string("tsk-ghost")],
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, KanbanError::UnknownDependency { .. }));
}

#[test]
fn board_groups_by_column() {
    let k = kanban();
    let a = k.create_task(NewTask { description: "a".to_string(), ..Default::default() }).unwrap();
    let _b = k.create_task(NewTask { description: "b".to_string(), ..Default::default() }).unwrap();
    k.move_task(&a.id, KanbanColumn::InReview).unwrap();

    let board = k.board().unwrap();
    assert_eq!(board[&KanbanColumn::Backlog].len(), 1);
    assert_eq!(board[&KanbanColumn::InReview].len(), 1);
    assert_eq!(board[&KanbanColumn::Done].len(), 0);
}

#[test]
fn delete_lane_refuses_while_tasks_remain() {
    let k = kanban();
    let lane = lane_with_toggles(&k, LaneToggles::default());
    k.create_task(NewTask {
        description: "x".to_string(),
        lane_id: Some(lane.id.clone()),
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(k.delete_lane(&lane.id), Err(KanbanError::LaneNotEmpty(_))));
}

#[test]
fn sweep_auto_close_archives_after_grace() {
    let k = kanban();
    let lane = lane_with_toggles(
        &k,
        LaneToggles { auto_close: true, ..Default::default() },
    );
    let task = k
        .create_task(NewTask {
            description: "x".to_string(),
            lane_id: Some(lane.id.clone()),
            ..Default::default()
        })
        .unwrap();
    k.move_task(&task.id, KanbanColumn::Done).unwrap();

    // Inside the grace window: untouched
    assert!(k.sweep_auto_close(Duration::from_secs(60)).unwrap().is_empty());

    k.clock.advance(Duration::from_secs(120));
    let swept = k.sweep_auto_close(Duration::from_secs(60)).unwrap();
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].0, task.id);

    // Archived tasks are not swept twice
    assert!(k.sweep_auto_close(Duration::from_secs(60)).unwrap().is_empty());
    let archived = k.get_task(task.id.as_str()).unwrap();
    assert!(archived.tags.iter().any(|t| t == "archived"));
}

#[test]
fn sweep_skips_auto_close_false() {
    let k = kanban();
    let task = k
        .create_task(NewTask {
            description: "x".to_string(),
            toggles: Toggles { auto_close: Some(false), ..Default::default() },
            ..Default::default()
        })
        .unwrap();
    k.move_task(&task.id, KanbanColumn::Done).unwrap();
    k.clock.advance(Duration::from_secs(3600));
    assert!(k.sweep_auto_close(Duration::from_secs(60)).unwrap().is_empty());
}

#[test]
fn start_and_stop_task_round_trip() {
    let k = kanban();
    let task = k.create_task(NewTask { description: "x".to_string(), ..Default::default() }).unwrap();

    let started = k.start_task(&task.id).unwrap();
    assert_eq!(started.column, KanbanColumn::InProgress);
    assert_eq!(started.status, TaskStatus::Pending);

    let stopped = k.stop_task(&task.id).unwrap();
    assert_eq!(stopped.column, KanbanColumn::Todo);
    assert_eq!(stopped.status, TaskStatus::Pending);
    assert_eq!(stopped.assigned_agent_id, None);
}
