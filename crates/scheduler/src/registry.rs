// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent control file: which agents exist, and which queue (agent type)
//! each one services.
//!
//! Two indexes are maintained side by side: `by_type` (queue -> ordered
//! agent names, for the queue sweep) and `by_name` (name -> queue, for
//! `typeOf`). A malformed reload never partially clobbers a loaded
//! registry — the full replacement pair is built off to the side and only
//! swapped in once it succeeds, per §9's cyclic-reference design note.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent control file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid JSON in agent control file {}: {source}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("agent control file {} must contain a JSON array", .0.display())]
    NotAnArray(PathBuf),

    #[error("agent control file {} contains an empty array (no agents defined)", .0.display())]
    EmptyRoster(PathBuf),

    #[error("entry {index} in {} is missing required field '{field}'", .path.display())]
    MissingField {
        path: PathBuf,
        index: usize,
        field: &'static str,
    },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One entry from the agent control file, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEntry {
    pub agent_name: String,
    pub agent_type: String,
}

/// Raw on-disk shape, permissive about unknown fields (logged, not rejected).
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "agentName")]
    agent_name: Option<String>,
    #[serde(rename = "agentType")]
    agent_type: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

struct Indexes {
    /// Raw roster in file order, including duplicates — mirrors `allNames()`'s contract.
    entries: Vec<AgentEntry>,
    by_type: IndexMap<String, Vec<String>>,
    by_name: IndexMap<String, String>,
}

/// Loads and indexes the agent control file. Thread-safe: `reload()` may be
/// called concurrently with reads.
pub struct AgentRegistry {
    control_file: PathBuf,
    indexes: Mutex<Indexes>,
}

impl AgentRegistry {
    /// Load the registry from `control_file`, failing on any of: missing
    /// file, invalid JSON, non-array root, missing required field, or an
    /// empty array (strict policy, SPEC_FULL §9 Open Questions).
    pub fn load(control_file: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let control_file = control_file.into();
        let indexes = build_indexes(&control_file)?;
        Ok(Self {
            control_file,
            indexes: Mutex::new(indexes),
        })
    }

    /// Reload from disk. On any error the previously loaded indexes are
    /// kept untouched and the error is returned to the caller.
    pub fn reload(&self) -> Result<(), RegistryError> {
        let fresh = build_indexes(&self.control_file)?;
        *self.indexes.lock() = fresh;
        Ok(())
    }

    /// Agent names servicing `queue`, in file order. Empty if the queue is unknown.
    pub fn agents_by_type(&self, queue: &str) -> Vec<String> {
        self.indexes
            .lock()
            .by_type
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    /// The queue (agent type) `name` services, if registered.
    pub fn type_of(&self, name: &str) -> Option<String> {
        self.indexes.lock().by_name.get(name).cloned()
    }

    /// Every distinct queue, in first-seen order.
    pub fn all_types(&self) -> Vec<String> {
        self.indexes.lock().by_type.keys().cloned().collect()
    }

    /// Every agent name in file order, including duplicates.
    pub fn all_names(&self) -> Vec<String> {
        self.indexes
            .lock()
            .entries
            .iter()
            .map(|e| e.agent_name.clone())
            .collect()
    }
}

fn build_indexes(path: &Path) -> Result<Indexes, RegistryError> {
    if !path.exists() {
        return Err(RegistryError::NotFound(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|source| RegistryError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

    let items = value
        .as_array()
        .ok_or_else(|| RegistryError::NotAnArray(path.to_path_buf()))?;

    if items.is_empty() {
        return Err(RegistryError::EmptyRoster(path.to_path_buf()));
    }

    let mut entries = Vec::with_capacity(items.len());
    let mut by_type: IndexMap<String, Vec<String>> = IndexMap::new();
    let mut by_name: IndexMap<String, String> = IndexMap::new();

    for (index, item) in items.iter().enumerate() {
        let raw_entry: RawEntry =
            serde_json::from_value(item.clone()).map_err(|source| RegistryError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;

        let agent_name = raw_entry.agent_name.ok_or(RegistryError::MissingField {
            path: path.to_path_buf(),
            index,
            field: "agentName",
        })?;
        let agent_type = raw_entry.agent_type.ok_or(RegistryError::MissingField {
            path: path.to_path_buf(),
            index,
            field: "agentType",
        })?;

        if !raw_entry.extra.is_empty() {
            let unexpected: Vec<&str> = raw_entry.extra.keys().map(String::as_str).collect();
            tracing::warn!(agent_name, fields = ?unexpected, "agent control entry has unexpected fields");
        }

        if by_name.contains_key(&agent_name) {
            tracing::warn!(agent_name, "duplicate agent name in control file, using last occurrence");
        }

        by_type.entry(agent_type.clone()).or_default().push(agent_name.clone());
        by_name.insert(agent_name.clone(), agent_type.clone());
        entries.push(AgentEntry { agent_name, agent_type });
    }

    Ok(Indexes { entries, by_type, by_name })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
