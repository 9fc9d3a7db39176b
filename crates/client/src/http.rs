// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synchronous-surface HTTP/JSON adapter for the task-service tool-call
//! protocol (§6.3, §9's "event-loop inside the RPC client" note: the
//! transport is async internally, callers never see a future they have to
//! drive).

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::warn;
use tsk_core::task::Task;

use crate::{ClientError, TaskServiceClient};

/// HTTP adapter over the task service's tool-call endpoint.
///
/// Each logical operation is a POST of `{tool, arguments}` to
/// `{endpoint}/tools/call`. A response may arrive as a bare JSON array or as
/// `{"tasks": [...]}`; both are accepted per §6.3. Connection/timeout
/// failures are retried with exponential backoff up to `max_retries`; a
/// well-formed error response from the service (`{"error": "..."}`) is never
/// retried.
#[derive(Clone)]
pub struct HttpTaskServiceClient {
    http: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
    backoff_factor: f64,
}

impl HttpTaskServiceClient {
    /// Build a client against `endpoint`, bounding every call to `timeout`
    /// and retrying connection/timeout failures up to `max_retries` times.
    pub fn new(endpoint: impl Into<String>, timeout: Duration, max_retries: u32) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            max_retries,
            retry_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<Value, ClientError> {
        let mut delay = self.retry_delay;
        let mut last_err = ClientError::Connection("no attempts made".to_string());

        for attempt in 0..self.max_retries.max(1) {
            match self.call_tool_once(tool, &arguments).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    last_err = e;
                    if attempt + 1 < self.max_retries.max(1) {
                        warn!(tool, attempt, error = %last_err, "retrying task-service call");
                        tokio::time::sleep(delay).await;
                        delay = delay.mul_f64(self.backoff_factor);
                    }
                }
            }
        }
        Err(last_err)
    }

    async fn call_tool_once(&self, tool: &str, arguments: &Value) -> Result<Value, ClientError> {
        let url = format!("{}/tools/call", self.endpoint);
        let body = json!({ "tool": tool, "arguments": arguments });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(e.to_string())
                } else {
                    ClientError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Connection(format!("invalid response body: {e}")))?;

        if !status.is_success() {
            return Err(ClientError::Api(format!(
                "HTTP {status}: {}",
                payload.get("error").and_then(Value::as_str).unwrap_or("unknown error")
            )));
        }
        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            return Err(ClientError::Api(error.to_string()));
        }
        Ok(payload)
    }

    fn parse_tasks(value: Value) -> Vec<Task> {
        let tasks_data = match value {
            Value::Object(mut map) => map.remove("tasks").unwrap_or(Value::Array(vec![])),
            array @ Value::Array(_) => array,
            _ => Value::Array(vec![]),
        };
        match tasks_data {
            Value::Array(items) => items.iter().map(Task::from_json).collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl TaskServiceClient for HttpTaskServiceClient {
    async fn list_idle(&self, agent: &str, limit: usize) -> Result<Vec<Task>, ClientError> {
        let value = self
            .call_tool(
                "list_tasks",
                json!({ "assigned_to": agent, "status": "idle", "limit": limit }),
            )
            .await?;
        Ok(Self::parse_tasks(value))
    }

    async fn get_unassigned_in_queue(&self, queue: &str, limit: usize) -> Result<Vec<Task>, ClientError> {
        let value = self
            .call_tool("get_unassigned_in_queue", json!({ "queue_name": queue }))
            .await?;
        let mut tasks = Self::parse_tasks(value);
        tasks.truncate(limit);
        Ok(tasks)
    }

    async fn assign(&self, task_id: &str, agent: &str) -> Result<bool, ClientError> {
        self.call_tool("update_task", json!({ "id": task_id, "assigned_to": agent }))
            .await?;
        Ok(true)
    }

    async fn claim(&self, task_id: &str, _agent: &str) -> Result<bool, ClientError> {
        self.call_tool("update_task", json!({ "id": task_id, "status": "working" }))
            .await?;
        Ok(true)
    }

    async fn requeue(&self, task_id: &str, _reason: &str) -> Result<bool, ClientError> {
        self.call_tool("update_task", json!({ "id": task_id, "status": "idle" }))
            .await?;
        Ok(true)
    }

    async fn complete(&self, task_id: &str, success: bool) -> Result<bool, ClientError> {
        let status = if success { "complete" } else { "idle" };
        self.call_tool("update_task", json!({ "id": task_id, "status": status }))
            .await?;
        Ok(true)
    }

    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError> {
        match self.call_tool("get_task", json!({ "id": task_id })).await {
            Ok(value) if value.is_null() => Ok(None),
            Ok(value) => {
                let task_value = value.get("task").cloned().unwrap_or(value);
                Ok(Some(Task::from_json(&task_value)))
            }
            Err(ClientError::Api(msg)) if msg.to_lowercase().contains("not found") => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Hits `GET {endpoint}/health` directly, bypassing the tool-call
    /// envelope and the retry loop — a single failed probe is the answer,
    /// not something to mask with backoff.
    async fn health_check(&self) -> Result<bool, ClientError> {
        let url = format!("{}/health", self.endpoint);
        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(e.to_string())
            } else {
                ClientError::Connection(e.to_string())
            }
        })?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
