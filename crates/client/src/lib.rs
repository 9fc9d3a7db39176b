// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Typed adapter over the remote task-service RPC surface (§6.3).
//!
//! The reconciler depends on the [`TaskServiceClient`] trait, never on a
//! transport. The shipped adapter ([`HttpTaskServiceClient`]) presents a
//! blocking-shaped async surface over a synchronous HTTP/JSON tool-call
//! protocol; [`FakeTaskServiceClient`] is a fully scriptable in-memory
//! double used by every reconciler test.

pub mod error;
pub mod http;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use error::ClientError;
pub use http::HttpTaskServiceClient;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTaskServiceClient, RecordedCall};

use async_trait::async_trait;
use tsk_core::task::Task;

/// Tool calls the reconciler consumes from the task service (§6.3).
///
/// Every method returns a `Result` rather than hiding failure behind an
/// empty collection: the reconciler is the one place that decides whether a
/// failure counts toward the pass's error statistics, and it can only do
/// that if the client tells it a call failed.
#[async_trait]
pub trait TaskServiceClient: Send + Sync {
    /// Tasks where `assigned_to == agent && status == idle`, up to `limit`.
    async fn list_idle(&self, agent: &str, limit: usize) -> Result<Vec<Task>, ClientError>;

    /// Tasks in `queue` with no assignee, up to `limit`.
    async fn get_unassigned_in_queue(&self, queue: &str, limit: usize) -> Result<Vec<Task>, ClientError>;

    /// Sets `assigned_to`. Returns whether the service accepted it.
    async fn assign(&self, task_id: &str, agent: &str) -> Result<bool, ClientError>;

    /// Transitions status to `working`. Idempotent.
    async fn claim(&self, task_id: &str, agent: &str) -> Result<bool, ClientError>;

    /// Transitions status back to `idle`, freeing the local lease.
    async fn requeue(&self, task_id: &str, reason: &str) -> Result<bool, ClientError>;

    /// Terminal transition. Used by the wrapper, not the reconciler.
    async fn complete(&self, task_id: &str, success: bool) -> Result<bool, ClientError>;

    /// Fetch a single task by id, or `None` if it doesn't exist.
    async fn get_task(&self, task_id: &str) -> Result<Option<Task>, ClientError>;

    /// Best-effort reachability probe. Never called by the reconciler itself
    /// — only by the config validator, ahead of a `run`, to warn about a
    /// misconfigured endpoint before any task work is attempted.
    async fn health_check(&self) -> Result<bool, ClientError>;
}
