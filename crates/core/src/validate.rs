// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input validation and sanitization.
//!
//! These are leaf utilities: they depend on nothing else in the crate graph,
//! so every other component (agent registry, lease store, reconciler) can
//! validate external input without risking a dependency cycle.
//!
//! Guards against command injection (CWE-78), path traversal (CWE-22), and
//! general improper input validation (CWE-20) in values that end up in
//! subprocess argv, file paths, or logs.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty {0} not allowed")]
    Empty(&'static str),

    #[error("{field} too long: {len} > {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("invalid {field}: {value:?} - only alphanumeric, hyphens, and underscores allowed")]
    InvalidChars { field: &'static str, value: String },

    #[error("absolute recipe paths not allowed: {0}")]
    AbsolutePath(String),

    #[error("parent directory references not allowed in recipe: {0}")]
    ParentReference(String),

    #[error("recipe must have .yaml or .yml extension: {0}")]
    BadExtension(String),

    #[error("recipe path outside recipes directory: {0}")]
    RecipeEscape(String),

    #[error("path traversal detected in task_id: {0}")]
    LeaseEscape(String),

    #[error("cannot resolve path {path}: {source}")]
    Unresolvable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid endpoint protocol: {0} - only http/https/ws/wss allowed")]
    InvalidScheme(String),

    #[error("localhost endpoints not allowed in production: {0}")]
    LocalhostForbidden(String),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("file too large: {name} is {size_mb:.2}MB (max: {max_mb}MB)")]
    TooLarge {
        name: String,
        size_mb: f64,
        max_mb: u64,
    },
}

const MAX_IDENTIFIER_LEN: usize = 64;
const MAX_HOSTNAME_LEN: usize = 253;

/// Validate an alphanumeric identifier (plus `-`/`_`) bound for subprocess
/// argv, file paths, or logs.
pub fn validate_identifier(value: &str, name: &'static str) -> Result<String, ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty(name));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: name,
            len: value.len(),
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(ValidationError::InvalidChars {
            field: name,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

pub fn validate_task_id(task_id: &str) -> Result<String, ValidationError> {
    validate_identifier(task_id, "task_id")
}

pub fn validate_agent_name(agent: &str) -> Result<String, ValidationError> {
    validate_identifier(agent, "agent")
}

/// Validate and resolve a recipe path, ensuring it stays within `recipes_dir`.
///
/// Rejects absolute paths, `..` components, and any extension other than
/// `.yaml`/`.yml`, then confirms the resolved path is still a descendant of
/// `recipes_dir` (blocks symlink escapes).
pub fn validate_recipe_path(recipe: &str, recipes_dir: &Path) -> Result<PathBuf, ValidationError> {
    let recipe_path = Path::new(recipe);

    if recipe_path.is_absolute() {
        return Err(ValidationError::AbsolutePath(recipe.to_string()));
    }
    if recipe_path
        .components()
        .any(|c| c == std::path::Component::ParentDir)
    {
        return Err(ValidationError::ParentReference(recipe.to_string()));
    }
    if !(recipe.ends_with(".yaml") || recipe.ends_with(".yml")) {
        return Err(ValidationError::BadExtension(recipe.to_string()));
    }

    let candidate = recipes_dir.join(recipe);
    let resolved = resolve(&candidate)?;
    let recipes_dir_resolved = resolve(recipes_dir)?;

    if !resolved.starts_with(&recipes_dir_resolved) {
        return Err(ValidationError::RecipeEscape(recipe.to_string()));
    }

    Ok(resolved)
}

/// Validate a task id and construct the lease file path for it safely.
pub fn validate_lease_path(task_id: &str, lease_dir: &Path) -> Result<PathBuf, ValidationError> {
    let validated = validate_task_id(task_id)?;
    let lease_path = lease_dir.join(format!("task_{validated}.json"));

    // The lease directory may not exist yet on first write; resolve what we
    // can and fall back to lexical containment rather than failing outright.
    match (resolve(&lease_path), resolve(lease_dir)) {
        (Ok(resolved), Ok(dir_resolved)) if !resolved.starts_with(&dir_resolved) => {
            Err(ValidationError::LeaseEscape(task_id.to_string()))
        }
        _ => Ok(lease_path),
    }
}

fn resolve(path: &Path) -> Result<PathBuf, ValidationError> {
    path.canonicalize().or_else(|_| {
        // Parent may not exist yet (e.g. lease_dir before first create());
        // canonicalize what exists and lexically append the rest.
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                let parent_resolved = parent.canonicalize().map_err(|e| {
                    ValidationError::Unresolvable {
                        path: path.display().to_string(),
                        source: e,
                    }
                })?;
                let file_name = path.file_name().unwrap_or_default();
                Ok(parent_resolved.join(file_name))
            }
            _ => Ok(path.to_path_buf()),
        }
    })
}

/// Validate a task-service endpoint URL. Only `http(s)`/`ws(s)` schemes are
/// accepted; `allow_localhost` gates the dev-friendly loopback exception
/// (set to `false` to harden against SSRF in production deployments).
pub fn validate_endpoint(endpoint: &str, allow_localhost: bool) -> Result<String, ValidationError> {
    let scheme_end = endpoint.find("://");
    let scheme = scheme_end.map(|i| &endpoint[..i]).unwrap_or("");

    if !matches!(scheme, "http" | "https" | "ws" | "wss") {
        return Err(ValidationError::InvalidScheme(scheme.to_string()));
    }

    if !allow_localhost {
        let rest = &endpoint[scheme_end.map(|i| i + 3).unwrap_or(0)..];
        let host = rest
            .split(['/', ':'])
            .next()
            .unwrap_or("")
            .trim_matches(['[', ']']);
        if matches!(host, "localhost" | "127.0.0.1" | "0.0.0.0" | "::1") {
            return Err(ValidationError::LocalhostForbidden(endpoint.to_string()));
        }
    }

    Ok(endpoint.to_string())
}

/// Validate a JSON file's size before parsing it, to guard against a
/// maliciously or accidentally huge control file.
pub fn validate_json_file_size(file_path: &Path, max_size_mb: u64) -> Result<(), ValidationError> {
    let meta = std::fs::metadata(file_path)
        .map_err(|_| ValidationError::FileNotFound(file_path.to_path_buf()))?;
    let size_mb = meta.len() as f64 / (1024.0 * 1024.0);
    if size_mb > max_size_mb as f64 {
        return Err(ValidationError::TooLarge {
            name: file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size_mb,
            max_mb: max_size_mb,
        });
    }
    Ok(())
}

/// Validate a hostname for use in logging and lease identification (RFC 1123
/// charset, length-capped to block log injection via an oversized value).
pub fn validate_hostname(hostname: &str) -> Result<String, ValidationError> {
    if hostname.is_empty() {
        return Err(ValidationError::Empty("hostname"));
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "hostname",
            len: hostname.len(),
            max: MAX_HOSTNAME_LEN,
        });
    }
    if !hostname
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
    {
        return Err(ValidationError::InvalidChars {
            field: "hostname",
            value: hostname.to_string(),
        });
    }
    Ok(hostname.to_string())
}

/// Sanitize a path for logging: full path when `debug_mode`, filename only
/// otherwise (avoids leaking directory layout in non-debug logs).
pub fn sanitize_path_for_log(path: &Path, debug_mode: bool) -> String {
    if debug_mode {
        path.display().to_string()
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
