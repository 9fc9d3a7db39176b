// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration surface (§6.6, §9's ambient-stack note): resolved
//! once at startup from environment variables with CLI-flag overrides
//! layered on top, never the reverse. The resolved value is an immutable
//! struct threaded through the reconciler rather than read from globals.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

const ENV_PREFIX: &str = "TINYSCHEDULER_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("base path does not exist or is not a directory: {}", .0.display())]
    BasePath(PathBuf),

    #[error("recipes directory does not exist or is not a directory: {}", .0.display())]
    RecipesDir(PathBuf),

    #[error("external binary not found: {}", .0.display())]
    BinaryMissing(PathBuf),

    #[error("external binary is not executable: {}", .0.display())]
    BinaryNotExecutable(PathBuf),

    #[error("at least one agent limit must be configured")]
    NoAgentLimits,

    #[error("loop interval must be positive, got {0}")]
    LoopInterval(i64),

    #[error("heartbeat interval must be positive, got {0}")]
    HeartbeatInterval(i64),

    #[error("max runtime must be positive, got {0}")]
    MaxRuntime(i64),

    #[error("invalid MCP endpoint (must start with http://, https://, ws://, or wss://): {0}")]
    Endpoint(String),

    #[error("failed to create directory {}: {source}", .path.display())]
    DirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid agent limits string {0:?}: {1}")]
    AgentLimits(String, String),
}

/// Fully resolved scheduler configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub base_path: PathBuf,
    pub running_dir: PathBuf,
    pub log_dir: PathBuf,
    pub recipes_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub task_cache_dir: PathBuf,
    pub lock_file: PathBuf,
    pub agent_control_file: PathBuf,

    pub agent_limits: BTreeMap<String, u32>,

    pub external_bin: PathBuf,
    pub mcp_endpoint: String,

    pub loop_interval_sec: u64,
    pub heartbeat_interval_sec: u64,
    pub max_runtime_sec: i64,

    pub dry_run: bool,
    pub log_level: String,
    pub enabled: bool,
    pub disable_blocking: bool,

    pub hostname: String,
}

/// Overrides layered on top of the environment-derived baseline, one field
/// per §6.5 CLI flag. `None` means "use whatever the environment (or
/// default) already resolved".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_path: Option<PathBuf>,
    pub running_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub recipes_dir: Option<PathBuf>,
    pub external_bin: Option<PathBuf>,
    pub mcp_endpoint: Option<String>,
    /// Repeatable `--agent-limit NAME=N` flags; later entries win on conflict.
    pub agent_limit: Vec<String>,
    pub loop_interval_sec: Option<u64>,
    pub heartbeat_interval_sec: Option<u64>,
    pub max_runtime_sec: Option<i64>,
    pub log_level: Option<String>,
    pub dry_run: bool,
    pub disable_blocking: bool,
}

impl Config {
    /// Resolve configuration from `TINYSCHEDULER_*` environment variables,
    /// falling back to documented defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_path = env_path("BASE_PATH").unwrap_or_else(|| PathBuf::from("/var/lib/tinyscheduler"));

        let running_dir = resolve_relative(&base_path, env_path("RUNNING_DIR"), "state/running");
        let log_dir = resolve_relative(&base_path, env_path("LOG_DIR"), "state/logs");
        let recipes_dir = resolve_relative(&base_path, env_path("RECIPES_DIR"), "recipes");
        let bin_dir = resolve_relative(&base_path, env_path("BIN_DIR"), "scripts");
        let task_cache_dir = resolve_relative(&base_path, env_path("TASK_CACHE_DIR"), "state/tasks");
        let lock_file = resolve_relative(&base_path, env_path("LOCK_FILE"), "state/tinyscheduler.lock");
        let agent_control_file = resolve_relative(
            &base_path,
            env_path("AGENT_CONTROL_FILE"),
            "config/agent-control.json",
        );

        let agent_limits_str = env_var("AGENT_LIMITS").unwrap_or_else(|| "{\"dispatcher\":1}".to_string());
        let agent_limits = parse_agent_limits(&agent_limits_str)?;

        let external_bin_str = env_var("BIN_DIR_BIN")
            .or_else(|| env_var("GOOSE_BIN"))
            .unwrap_or_else(|| "/usr/local/bin/agent-wrapper".to_string());
        let external_bin = {
            let p = PathBuf::from(external_bin_str);
            if p.is_absolute() { p } else { base_path.join(p) }
        };

        let mcp_endpoint = env_var("MCP_ENDPOINT").unwrap_or_else(|| "http://localhost:3000".to_string());

        let loop_interval_sec = env_u64("LOOP_INTERVAL_SEC").unwrap_or(60);
        let heartbeat_interval_sec = env_u64("HEARTBEAT_SEC").unwrap_or(15);
        let max_runtime_sec = env_i64("MAX_RUNTIME_SEC").unwrap_or(3600);

        let log_level = env_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let dry_run = env_bool("DRY_RUN");
        let enabled = env_bool("ENABLED");
        let disable_blocking = env_bool("DISABLE_BLOCKING");

        let hostname = hostname();

        Ok(Config {
            base_path,
            running_dir,
            log_dir,
            recipes_dir,
            bin_dir,
            task_cache_dir,
            lock_file,
            agent_control_file,
            agent_limits,
            external_bin,
            mcp_endpoint,
            loop_interval_sec,
            heartbeat_interval_sec,
            max_runtime_sec,
            dry_run,
            log_level,
            enabled,
            disable_blocking,
            hostname,
        })
    }

    /// Apply CLI-flag overrides. Environment resolution always runs first;
    /// this is the only place CLI values are layered in, and only in this
    /// direction (never environment-over-CLI).
    pub fn apply_overrides(mut self, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if let Some(base_path) = &overrides.base_path {
            self.base_path = base_path.clone();
        }
        if let Some(running_dir) = &overrides.running_dir {
            self.running_dir = resolve_against(&self.base_path, running_dir);
        }
        if let Some(log_dir) = &overrides.log_dir {
            self.log_dir = resolve_against(&self.base_path, log_dir);
        }
        if let Some(recipes_dir) = &overrides.recipes_dir {
            self.recipes_dir = resolve_against(&self.base_path, recipes_dir);
        }
        if let Some(external_bin) = &overrides.external_bin {
            self.external_bin = resolve_against(&self.base_path, external_bin);
        }
        if let Some(endpoint) = &overrides.mcp_endpoint {
            self.mcp_endpoint = endpoint.clone();
        }
        for spec in &overrides.agent_limit {
            let (name, slots) = spec.split_once('=').ok_or_else(|| {
                ConfigError::AgentLimits(spec.clone(), "expected NAME=N".to_string())
            })?;
            let slots: u32 = slots
                .trim()
                .parse()
                .map_err(|_| ConfigError::AgentLimits(spec.clone(), "slot count must be a non-negative integer".to_string()))?;
            self.agent_limits.insert(name.trim().to_string(), slots);
        }
        if let Some(v) = overrides.loop_interval_sec {
            self.loop_interval_sec = v;
        }
        if let Some(v) = overrides.heartbeat_interval_sec {
            self.heartbeat_interval_sec = v;
        }
        if let Some(v) = overrides.max_runtime_sec {
            self.max_runtime_sec = v;
        }
        if let Some(level) = &overrides.log_level {
            self.log_level = level.clone();
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
        if overrides.disable_blocking {
            self.disable_blocking = true;
        }
        Ok(self)
    }

    /// Collect every validation problem rather than stopping at the first,
    /// so `validate-config` can report everything in one pass.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !self.base_path.is_dir() {
            errors.push(ConfigError::BasePath(self.base_path.clone()));
        }
        if !self.recipes_dir.is_dir() {
            errors.push(ConfigError::RecipesDir(self.recipes_dir.clone()));
        }
        if !self.external_bin.exists() {
            errors.push(ConfigError::BinaryMissing(self.external_bin.clone()));
        } else if !is_executable(&self.external_bin) {
            errors.push(ConfigError::BinaryNotExecutable(self.external_bin.clone()));
        }
        if self.agent_limits.is_empty() {
            errors.push(ConfigError::NoAgentLimits);
        }
        if self.loop_interval_sec == 0 {
            errors.push(ConfigError::LoopInterval(0));
        }
        if self.heartbeat_interval_sec == 0 {
            errors.push(ConfigError::HeartbeatInterval(0));
        }
        if self.max_runtime_sec <= 0 {
            errors.push(ConfigError::MaxRuntime(self.max_runtime_sec));
        }
        if !["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|p| self.mcp_endpoint.starts_with(p))
        {
            errors.push(ConfigError::Endpoint(self.mcp_endpoint.clone()));
        }

        errors
    }

    /// Best-effort creation of the directories the scheduler writes into.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for dir in [&self.running_dir, &self.log_dir, &self.task_cache_dir] {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::DirCreate {
                path: dir.clone(),
                source,
            })?;
        }
        if let Some(parent) = self.lock_file.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::DirCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!(self)
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "TinyScheduler Configuration:")?;
        writeln!(f, "  Base Path: {}", self.base_path.display())?;
        writeln!(f, "  Running Dir: {}", self.running_dir.display())?;
        writeln!(f, "  Log Dir: {}", self.log_dir.display())?;
        writeln!(f, "  Recipes Dir: {}", self.recipes_dir.display())?;
        writeln!(f, "  Agent Control File: {}", self.agent_control_file.display())?;
        writeln!(f, "  External Binary: {}", self.external_bin.display())?;
        writeln!(f, "  MCP Endpoint: {}", self.mcp_endpoint)?;
        let limits = self
            .agent_limits
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "  Agent Limits: {limits}")?;
        writeln!(f, "  Loop Interval: {}s", self.loop_interval_sec)?;
        writeln!(f, "  Heartbeat Interval: {}s", self.heartbeat_interval_sec)?;
        writeln!(f, "  Max Runtime: {}s", self.max_runtime_sec)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Dry Run: {}", self.dry_run)?;
        writeln!(f, "  Enabled: {}", self.enabled)?;
        writeln!(f, "  Disable Blocking: {}", self.disable_blocking)?;
        write!(f, "  Hostname: {}", self.hostname)
    }
}

/// The seed written by `validate-config --fix` when the control file is
/// absent: two default agents covering an orchestrator and an architect.
pub const DEFAULT_AGENT_CONTROL: &str = r#"[
  { "agentName": "dispatcher", "agentType": "orchestrator" },
  { "agentName": "architect", "agentType": "architect" }
]
"#;

/// Write [`DEFAULT_AGENT_CONTROL`] to `path` if it doesn't already exist.
pub fn seed_default_agent_control(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_AGENT_CONTROL)?;
    Ok(true)
}

/// Parse agent limits accepted in either form: a JSON object or
/// `name:N,name:N` shorthand (§6.6).
pub fn parse_agent_limits(input: &str) -> Result<BTreeMap<String, u32>, ConfigError> {
    let trimmed = input.trim();

    if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)
            .map_err(|e| ConfigError::AgentLimits(trimmed.to_string(), e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| ConfigError::AgentLimits(trimmed.to_string(), "must be a JSON object".to_string()))?;
        let mut limits = BTreeMap::new();
        for (agent, slots) in object {
            let slots = slots.as_u64().ok_or_else(|| {
                ConfigError::AgentLimits(trimmed.to_string(), format!("invalid slot count for agent '{agent}'"))
            })?;
            limits.insert(agent.clone(), slots as u32);
        }
        return Ok(limits);
    }

    let mut limits = BTreeMap::new();
    if trimmed.is_empty() {
        return Ok(limits);
    }
    for spec in trimmed.split(',') {
        let spec = spec.trim();
        let (agent, slots) = spec.split_once(':').ok_or_else(|| {
            ConfigError::AgentLimits(spec.to_string(), "expected 'agent:slots'".to_string())
        })?;
        let slots: u32 = slots
            .trim()
            .parse()
            .map_err(|_| ConfigError::AgentLimits(spec.to_string(), "slot count must be a non-negative integer".to_string()))?;
        limits.insert(agent.trim().to_string(), slots);
    }
    Ok(limits)
}

fn resolve_relative(base: &Path, configured: Option<PathBuf>, default_rel: &str) -> PathBuf {
    match configured {
        Some(p) => resolve_against(base, &p),
        None => base.join(default_rel),
    }
}

fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{suffix}")).ok()
}

fn env_path(suffix: &str) -> Option<PathBuf> {
    env_var(suffix).map(PathBuf::from)
}

fn env_u64(suffix: &str) -> Option<u64> {
    env_var(suffix).and_then(|s| s.parse().ok())
}

fn env_i64(suffix: &str) -> Option<i64> {
    env_var(suffix).and_then(|s| s.parse().ok())
}

fn env_bool(suffix: &str) -> bool {
    env_var(suffix)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.exists()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
