// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake task-service client for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ClientError, TaskServiceClient};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tsk_core::task::Task;

/// Recorded task-service call
#[derive(Debug, Clone)]
pub enum RecordedCall {
    ListIdle { agent: String, limit: usize },
    GetUnassignedInQueue { queue: String, limit: usize },
    Assign { task_id: String, agent: String },
    Claim { task_id: String, agent: String },
    Requeue { task_id: String, reason: String },
    Complete { task_id: String, success: bool },
    GetTask { task_id: String },
}

struct FakeState {
    tasks: HashMap<String, Task>,
    /// Queue membership, tracked separately since [`Task`] itself carries no
    /// queue field (the task service keys queues by name, not the task).
    queues: HashMap<String, String>,
    calls: Vec<RecordedCall>,
    failures: HashMap<&'static str, ClientError>,
}

/// Fake task-service client for testing
///
/// Holds an in-memory task table seeded with [`FakeTaskServiceClient::seed_task`]
/// and mutated by the trait methods, so a test can assert on task state after a
/// reconciliation pass without spinning up a server. A failure for a given
/// method name, once set with [`FakeTaskServiceClient::fail_next`], is returned
/// exactly once and then cleared.
#[derive(Clone)]
pub struct FakeTaskServiceClient {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeTaskServiceClient {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                tasks: HashMap::new(),
                queues: HashMap::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
            })),
        }
    }
}

impl FakeTaskServiceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    /// Insert or replace a task in the fake's table.
    pub fn seed_task(&self, task: Task) {
        let mut inner = self.inner.lock();
        inner.tasks.insert(task.task_id.clone(), task);
    }

    /// Insert or replace a task and record which queue it belongs to, so
    /// [`TaskServiceClient::get_unassigned_in_queue`] can find it.
    pub fn seed_task_in_queue(&self, task: Task, queue: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.queues.insert(task.task_id.clone(), queue.into());
        inner.tasks.insert(task.task_id.clone(), task);
    }

    /// Current state of a task, if present.
    pub fn get_seeded(&self, id: &str) -> Option<Task> {
        self.inner.lock().tasks.get(id).cloned()
    }

    /// Arrange for the next call to `method` to fail with `error` instead of
    /// touching the task table. Cleared after one use.
    ///
    /// `method` is one of: `"list_idle"`, `"get_unassigned_in_queue"`,
    /// `"assign"`, `"claim"`, `"requeue"`, `"complete"`, `"get_task"`,
    /// `"health_check"`.
    pub fn fail_next(&self, method: &'static str, error: ClientError) {
        self.inner.lock().failures.insert(method, error);
    }

    fn take_failure(&self, method: &'static str) -> Option<ClientError> {
        self.inner.lock().failures.remove(method)
    }
}

#[async_trait]
impl TaskServiceClient for FakeTaskServiceClient {
    async fn list_idle(&self, agent: &str, limit: usize) -> Result<Vec<Task>, ClientError> {
        self.inner.lock().calls.push(RecordedCall::ListIdle {
            agent: agent.to_string(),
            limit,
        });
        if let Some(err) = self.take_failure("list_idle") {
            return Err(err);
        }
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.agent.as_deref() == Some(agent) && t.status == "idle")
            .cloned()
            .collect();
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn get_unassigned_in_queue(&self, queue: &str, limit: usize) -> Result<Vec<Task>, ClientError> {
        self.inner.lock().calls.push(RecordedCall::GetUnassignedInQueue {
            queue: queue.to_string(),
            limit,
        });
        if let Some(err) = self.take_failure("get_unassigned_in_queue") {
            return Err(err);
        }
        let inner = self.inner.lock();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| {
                t.agent.is_none() && inner.queues.get(&t.task_id).map(String::as_str) == Some(queue)
            })
            .cloned()
            .collect();
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn assign(&self, task_id: &str, agent: &str) -> Result<bool, ClientError> {
        self.inner.lock().calls.push(RecordedCall::Assign {
            task_id: task_id.to_string(),
            agent: agent.to_string(),
        });
        if let Some(err) = self.take_failure("assign") {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(task_id) {
            Some(task) => {
                task.agent = Some(agent.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim(&self, task_id: &str, agent: &str) -> Result<bool, ClientError> {
        self.inner.lock().calls.push(RecordedCall::Claim {
            task_id: task_id.to_string(),
            agent: agent.to_string(),
        });
        if let Some(err) = self.take_failure("claim") {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = "working".to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn requeue(&self, task_id: &str, reason: &str) -> Result<bool, ClientError> {
        self.inner.lock().calls.push(RecordedCall::Requeue {
            task_id: task_id.to_string(),
            reason: reason.to_string(),
        });
        if let Some(err) = self.take_failure("requeue") {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = "idle".to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, task_id: &str, success: bool) -> Result<bool, ClientError> {
        self.inner.lock().calls.push(RecordedCall::Complete {
            task_id: task_id.to_string(),
            success,
        });
        if let Some(err) = self.take_failure("complete") {
            return Err(err);
        }
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(task_id) {
            Some(task) => {
                task.status = if success { "complete" } else { "idle" }.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError> {
        self.inner.lock().calls.push(RecordedCall::GetTask {
            task_id: task_id.to_string(),
        });
        if let Some(err) = self.take_failure("get_task") {
            return Err(err);
        }
        Ok(self.inner.lock().tasks.get(task_id).cloned())
    }

    async fn health_check(&self) -> Result<bool, ClientError> {
        if let Some(err) = self.take_failure("health_check") {
            return Err(err);
        }
        Ok(true)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
