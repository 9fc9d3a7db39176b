// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failure taxonomy for task-service calls.
///
/// `Connection`/`Timeout` are retried with backoff inside
/// [`crate::HttpTaskServiceClient`]; `Api` is not — the service understood
/// the call and rejected it, so retrying would just repeat the rejection.
#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("connection to task service failed: {0}")]
    Connection(String),

    #[error("task service call timed out: {0}")]
    Timeout(String),

    #[error("task service rejected call: {0}")]
    Api(String),
}

impl ClientError {
    /// Whether the HTTP adapter's retry loop should reattempt this call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Timeout(_))
    }
}
