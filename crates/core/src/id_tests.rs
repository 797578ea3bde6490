// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_carry_prefix() {
    let id = AgentId::new();
    assert!(id.as_str().starts_with("agt-"));
    assert_eq!(id.as_str().len(), "agt-".len() + 16);
}

#[test]
fn generated_ids_are_unique() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
}

#[test]
fn from_string_preserves_value() {
    let id = LaneId::from_string("lane-fixed");
    assert_eq!(id, "lane-fixed");
    assert_eq!(id.to_string(), "lane-fixed");
}

#[test]
fn short_truncates() {
    let id = AgentId::from_string("agt-abcdefgh");
    assert_eq!(id.short(8), "agt-abcd");
    assert_eq!(short("ab", 8), "ab");
}

#[test]
fn serde_is_transparent() {
    let id = RunId::from_string("run-x1");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"run-x1\"");
    let back: RunId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
