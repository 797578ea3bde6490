// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

fn state_with_task() -> StoreState {
    let mut state = StoreState::default();
    let task = hq_core::Task::new("snapshot me", Utc::now());
    state.tasks.insert(task.id.as_str().to_string(), task);
    state
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.snapshot");

    let snapshot = Snapshot::new(7, state_with_task());
    snapshot.save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.generation, 7);
    assert_eq!(loaded.state.tasks.len(), 1);
}

#[test]
fn missing_file_loads_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Snapshot::load(&dir.path().join("nope")).unwrap().is_none());
}

#[test]
fn corrupt_file_rotated_to_bak() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.snapshot");
    std::fs::write(&path, b"not a snapshot").unwrap();

    assert!(Snapshot::load(&path).unwrap().is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn repeated_corruption_rotates_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.snapshot");

    for _ in 0..4 {
        std::fs::write(&path, b"garbage").unwrap();
        assert!(Snapshot::load(&path).unwrap().is_none());
    }

    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn save_is_atomic_over_existing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.snapshot");

    Snapshot::new(1, StoreState::default()).save(&path).unwrap();
    Snapshot::new(2, state_with_task()).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.generation, 2);
    assert!(!path.with_extension("tmp").exists());
}
