// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler's view of a task-service task.
//!
//! Tasks come from an external, schema-loose JSON API: we normalize the few
//! fields the reconciler actually needs and otherwise stay permissive about
//! shape, rather than modeling the task-service's full record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status string as reported by the task service. Kept as a thin wrapper
/// around the server's own vocabulary (`idle`, `working`, `complete`, ...)
/// rather than a closed Rust enum, since the task service is free to add
/// statuses the scheduler doesn't otherwise act on.
pub type TaskStatus = String;

/// A task as seen by the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub task_id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    /// Higher sorts first when spawn ordering ties on blocker count.
    #[serde(default)]
    pub priority: i64,
    /// Normalized to a string even when the task service reports an integer id.
    #[serde(default)]
    pub blocked_by_task_id: Option<String>,
    #[serde(default)]
    pub is_currently_blocked: bool,
}

fn default_status() -> TaskStatus {
    "idle".to_string()
}

impl Task {
    /// Parse a task from a raw JSON value returned by the task-service
    /// client, tolerating either `id` or `task_id`, and either `assigned_to`
    /// or `agent`, for the identifier/assignee fields.
    pub fn from_json(value: &Value) -> Self {
        let task_id = value
            .get("id")
            .or_else(|| value.get("task_id"))
            .map(stringify_id)
            .unwrap_or_default();

        let agent = value
            .get("assigned_to")
            .or_else(|| value.get("agent"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(default_status);

        let recipe = value
            .get("recipe")
            .and_then(Value::as_str)
            .map(str::to_string);

        let created_at = value
            .get("created_at")
            .and_then(Value::as_str)
            .map(str::to_string);

        let metadata = value.get("metadata").cloned().unwrap_or(Value::Object(Default::default()));

        let priority = value.get("priority").and_then(Value::as_i64).unwrap_or(0);

        let blocked_by_task_id = value.get("blocked_by_task_id").map(stringify_id);

        let is_currently_blocked = value
            .get("is_currently_blocked")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Task {
            task_id,
            agent,
            status,
            recipe,
            created_at,
            metadata,
            priority,
            blocked_by_task_id,
            is_currently_blocked,
        }
    }

    /// The recipe to spawn with: the task's own recipe if set, else
    /// `"{agent}.yaml"` as a per-agent default.
    pub fn recipe_or_default(&self, agent: &str) -> String {
        self.recipe.clone().unwrap_or_else(|| format!("{agent}.yaml"))
    }
}

fn stringify_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
