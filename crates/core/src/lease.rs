// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable local record of a spawned wrapper process.
//!
//! A lease is the scheduler's only on-disk bookkeeping: everything else
//! (task status, assignment) lives in the remote task service. Timestamps
//! are serialized as RFC 3339 with a literal `Z` suffix, matching the wire
//! format `chrono`'s `DateTime<Utc>` produces for `to_rfc3339_opts`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a lease. Terminal states are not modeled: a lease is
/// deleted on clean exit rather than transitioned to a "done" state.
pub type LeaseState = String;

fn default_state() -> LeaseState {
    "running".to_string()
}

/// A durable record that a wrapper for `task_id` is running on `host`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lease {
    pub task_id: String,
    pub agent: String,
    pub pid: i32,
    pub recipe: String,
    #[serde(with = "rfc3339_z")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "rfc3339_z")]
    pub heartbeat: DateTime<Utc>,
    pub host: String,
    #[serde(default = "default_state")]
    pub state: LeaseState,
    #[serde(default = "default_metadata")]
    pub metadata: Value,
}

fn default_metadata() -> Value {
    Value::Object(Default::default())
}

impl Lease {
    /// Build a fresh lease for a just-spawned wrapper: `started_at` and
    /// `heartbeat` both set to `now`, `state` defaulted to `"running"`.
    pub fn new(task_id: impl Into<String>, agent: impl Into<String>, pid: i32, recipe: impl Into<String>, host: impl Into<String>) -> Self {
        let now = Utc::now();
        Lease {
            task_id: task_id.into(),
            agent: agent.into(),
            pid,
            recipe: recipe.into(),
            started_at: now,
            heartbeat: now,
            host: host.into(),
            state: default_state(),
            metadata: default_metadata(),
        }
    }

    /// Seconds elapsed since the wrapper was spawned.
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    /// Seconds elapsed since the last heartbeat update.
    pub fn heartbeat_age_seconds(&self) -> i64 {
        (Utc::now() - self.heartbeat).num_seconds().max(0)
    }

    /// True if either the runtime or the heartbeat age exceeds
    /// `max_runtime_sec`. Does not check process liveness; that is the lease
    /// store's job (it needs an OS probe, not just the struct's fields).
    pub fn is_stale(&self, max_runtime_sec: i64) -> bool {
        self.age_seconds() > max_runtime_sec || self.heartbeat_age_seconds() > max_runtime_sec
    }
}

/// RFC 3339 serialization with a literal `Z` suffix instead of `+00:00`.
mod rfc3339_z {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Format `now` as RFC 3339 UTC with a `Z` suffix, for logging and reports.
pub fn format_now_z() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
