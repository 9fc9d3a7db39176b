// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn from_json_accepts_id_or_task_id() {
    let by_id = Task::from_json(&json!({"id": 7, "status": "idle"}));
    assert_eq!(by_id.task_id, "7");

    let by_task_id = Task::from_json(&json!({"task_id": "abc", "status": "idle"}));
    assert_eq!(by_task_id.task_id, "abc");
}

#[test]
fn from_json_accepts_assigned_to_or_agent() {
    let a = Task::from_json(&json!({"id": 1, "assigned_to": "vaela"}));
    assert_eq!(a.agent.as_deref(), Some("vaela"));

    let b = Task::from_json(&json!({"id": 1, "agent": "damien"}));
    assert_eq!(b.agent.as_deref(), Some("damien"));
}

#[test]
fn from_json_defaults_status_to_idle() {
    let task = Task::from_json(&json!({"id": 1}));
    assert_eq!(task.status, "idle");
}

#[test]
fn from_json_normalizes_integer_blocked_by_to_string() {
    let task = Task::from_json(&json!({"id": 2, "blocked_by_task_id": 1}));
    assert_eq!(task.blocked_by_task_id.as_deref(), Some("1"));
}

#[test]
fn from_json_normalizes_string_blocked_by() {
    let task = Task::from_json(&json!({"id": 2, "blocked_by_task_id": "1"}));
    assert_eq!(task.blocked_by_task_id.as_deref(), Some("1"));
}

#[test]
fn from_json_defaults_blocking_fields() {
    let task = Task::from_json(&json!({"id": 1}));
    assert_eq!(task.blocked_by_task_id, None);
    assert!(!task.is_currently_blocked);
    assert_eq!(task.priority, 0);
}

#[test]
fn from_json_reads_priority_and_blocked_flag() {
    let task = Task::from_json(&json!({
        "id": 1,
        "priority": 10,
        "is_currently_blocked": true,
    }));
    assert_eq!(task.priority, 10);
    assert!(task.is_currently_blocked);
}

#[test]
fn from_json_missing_id_yields_empty_task_id() {
    let task = Task::from_json(&json!({"status": "idle"}));
    assert_eq!(task.task_id, "");
}

#[test]
fn recipe_or_default_uses_task_recipe_when_set() {
    let task = Task::from_json(&json!({"id": 1, "recipe": "custom.yaml"}));
    assert_eq!(task.recipe_or_default("vaela"), "custom.yaml");
}

#[test]
fn recipe_or_default_falls_back_to_agent_name() {
    let task = Task::from_json(&json!({"id": 1}));
    assert_eq!(task.recipe_or_default("vaela"), "vaela.yaml");
}
