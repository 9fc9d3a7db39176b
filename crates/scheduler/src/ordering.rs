// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-ordering within a batch of candidates (§4.6.1).
//!
//! Blocked tasks are filtered first (unless blocking is disabled), blocker
//! counts are computed over the surviving set only, and the remaining tasks
//! are sorted by `(blocker_count desc, priority desc, created_at asc)`. A
//! missing `created_at` sorts as older than any timestamped task, so a task
//! the service hasn't stamped yet is never starved behind freshly-created
//! work.

use std::collections::HashMap;

use tsk_core::task::Task;

/// Filter and sort `tasks` per §4.6.1. When `blocking_enabled` is false, no
/// filtering occurs (every task, blocked or not, is a candidate).
pub fn order_candidates(tasks: Vec<Task>, blocking_enabled: bool) -> Vec<Task> {
    let survivors: Vec<Task> = if blocking_enabled {
        tasks.into_iter().filter(|t| !t.is_currently_blocked).collect()
    } else {
        tasks
    };

    let mut blocker_counts: HashMap<&str, usize> = HashMap::new();
    for task in &survivors {
        if let Some(blocked_by) = task.blocked_by_task_id.as_deref() {
            if survivors.iter().any(|t| t.task_id == blocked_by) {
                *blocker_counts.entry(blocked_by).or_insert(0) += 1;
            }
        }
    }

    let mut ordered = survivors;
    ordered.sort_by(|a, b| {
        let blockers_a = blocker_counts.get(a.task_id.as_str()).copied().unwrap_or(0);
        let blockers_b = blocker_counts.get(b.task_id.as_str()).copied().unwrap_or(0);

        blockers_b
            .cmp(&blockers_a)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| created_at_key(a).cmp(&created_at_key(b)))
    });

    ordered
}

/// `None` (no `created_at`) sorts before `Some(_)`, so an un-stamped task is
/// treated as older than anything with a timestamp.
fn created_at_key(task: &Task) -> (u8, &str) {
    match task.created_at.as_deref() {
        Some(ts) => (1, ts),
        None => (0, ""),
    }
}

#[cfg(test)]
#[path = "ordering_tests.rs"]
mod tests;
