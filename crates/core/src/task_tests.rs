// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn lane_toggles(auto_start: bool, auto_close: bool) -> LaneToggles {
    LaneToggles { auto_start, auto_close, ..Default::default() }
}

#[test]
fn stamp_fills_only_unset_toggles() {
    let mut toggles = Toggles { auto_close: Some(false), ..Default::default() };
    toggles.stamp(&lane_toggles(true, true));

    // autoStart was unset — inherited; autoClose explicit false — preserved
    assert_eq!(toggles.auto_start, Some(true));
    assert_eq!(toggles.auto_close, Some(false));
}

#[test]
fn explicit_false_beats_lane_true() {
    let toggles = Toggles { auto_close: Some(false), ..Default::default() };
    let lane = lane_toggles(true, true);
    let effective = toggles.effective(Some(&lane));
    assert!(!effective.auto_close);
    assert!(effective.auto_start);
}

#[test]
fn unset_without_lane_resolves_false() {
    let effective = Toggles::default().effective(None);
    assert!(!effective.auto_start);
    assert!(!effective.auto_pilot);
    assert!(!effective.auto_close);
    assert!(!effective.use_worktree);
    assert!(!effective.use_memory);
}

proptest! {
    // Effective value = task toggle if set, else lane default if a lane
    // exists, else false — for every combination.
    #[test]
    fn toggle_resolution_property(task in proptest::option::of(any::<bool>()),
                                  lane in proptest::option::of(any::<bool>())) {
        let toggles = Toggles { auto_pilot: task, ..Default::default() };
        let lane_defaults = lane.map(|v| LaneToggles { auto_pilot: v, ..Default::default() });
        let got = toggles.effective(lane_defaults.as_ref()).auto_pilot;
        let want = task.or(lane).unwrap_or(false);
        prop_assert_eq!(got, want);
    }
}

#[parameterized(
    backlog = { "backlog", KanbanColumn::Backlog },
    todo = { "todo", KanbanColumn::Todo },
    in_progress = { "in_progress", KanbanColumn::InProgress },
    in_review = { "in_review", KanbanColumn::InReview },
    done = { "done", KanbanColumn::Done },
)]
fn column_parse_round_trips(s: &str, column: KanbanColumn) {
    assert_eq!(KanbanColumn::parse(s), Some(column));
    assert_eq!(column.to_string(), s);
}

#[test]
fn column_parse_rejects_unknown() {
    assert_eq!(KanbanColumn::parse("icebox"), None);
}

#[test]
fn set_status_records_history() {
    let now = chrono::Utc::now();
    let mut task = Task::new("write hello", now);
    task.set_status(TaskStatus::Assigned, now);
    task.set_status(TaskStatus::InProgress, now);
    // Same-status transition is a no-op
    task.set_status(TaskStatus::InProgress, now);

    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.status_history.len(), 2);
    assert_eq!(task.status_history[0].from, TaskStatus::Pending);
    assert_eq!(task.status_history[1].to, TaskStatus::InProgress);
}

#[test]
fn terminal_statuses() {
    assert!(TaskStatus::Completed.is_terminal());
    assert!(TaskStatus::Failed.is_terminal());
    assert!(TaskStatus::Cancelled.is_terminal());
    assert!(!TaskStatus::InProgress.is_terminal());
}

#[test]
fn task_serde_round_trip() {
    let now = chrono::Utc::now();
    let mut task = Task::new("review PR", now);
    task.target_role = Some(crate::agent::AgentRole::Reviewer);
    task.toggles.auto_start = Some(true);
    task.tags.push("urgent".to_string());

    let json = serde_json::to_string(&task).unwrap();
    let back: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(back, task);
}
