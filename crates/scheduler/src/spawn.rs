// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawning a wrapper process for a matched (task, agent) pair (§4.6.2).
//!
//! Order of operations matters here: the child is launched detached first,
//! then a lease is written for it immediately, then the task is claimed on
//! the remote service. If the lease write fails we kill the child rather
//! than leave an unleased process running — a hardening the original
//! scheduler didn't have, since a leaked, un-leased wrapper is invisible to
//! every later reconciliation pass.

use std::os::unix::process::CommandExt as _;
use std::process::Stdio;

use thiserror::Error;
use tsk_client::TaskServiceClient;
use tsk_core::lease::Lease;
use tsk_core::task::Task;
use tsk_core::validate::{validate_agent_name, validate_recipe_path, validate_task_id, ValidationError};
use tsk_storage::lease_store::{LeaseStore, LeaseStoreError, LeaseWriter, PidProbe};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("invalid spawn input: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to launch wrapper process: {0}")]
    Launch(#[from] std::io::Error),

    #[error("wrapper process exited immediately without reporting a pid")]
    NoPid,

    #[error("failed to write lease, killed child pid {pid}: {source}")]
    LeaseAfterSpawn { pid: i32, source: LeaseStoreError },
}

/// Result of a successful spawn. `claimed` is `false` if the lease was
/// written but the subsequent `claim()` call failed or was rejected — the
/// wrapper still runs and a later reconciliation pass will pick the task up
/// again through `list_idle` once it self-reports.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub pid: i32,
    pub lease: Lease,
    pub claimed: bool,
}

/// Spawn a wrapper for `task` under `agent`, per §4.6.2.
pub async fn spawn_wrapper<W, P>(
    config: &Config,
    lease_store: &LeaseStore<W, P>,
    client: &dyn TaskServiceClient,
    task: &Task,
    agent: &str,
) -> Result<SpawnOutcome, SpawnError>
where
    W: LeaseWriter,
    P: PidProbe,
{
    validate_task_id(&task.task_id)?;
    validate_agent_name(agent)?;

    let recipe = task.recipe_or_default(agent);
    let recipe_path = validate_recipe_path(&recipe, &config.recipes_dir)?;

    let mut command = tokio::process::Command::new(&config.external_bin);
    command
        .arg("--task-id")
        .arg(&task.task_id)
        .arg("--agent")
        .arg(agent)
        .arg("--recipe")
        .arg(recipe_path.as_os_str())
        .arg("--running-dir")
        .arg(&config.running_dir)
        .arg("--external-bin")
        .arg(&config.external_bin)
        .arg("--mcp-endpoint")
        .arg(&config.mcp_endpoint)
        .arg("--heartbeat-sec")
        .arg(config.heartbeat_interval_sec.to_string())
        .arg("--hostname")
        .arg(&config.hostname)
        .current_dir(&config.base_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .kill_on_drop(false);

    let mut child = command.spawn()?;
    let pid = child.id().ok_or(SpawnError::NoPid)? as i32;

    // Reap in the background rather than block on completion: the wrapper
    // reports progress through the task service and its own heartbeat, not
    // through this process handle. Not reaping would leave a zombie behind
    // once the wrapper exits.
    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    let lease = Lease::new(task.task_id.clone(), agent.to_string(), pid, recipe, config.hostname.clone());

    if let Err(source) = lease_store.create(&lease) {
        kill_pid(pid);
        return Err(SpawnError::LeaseAfterSpawn { pid, source });
    }

    let claimed = match client.claim(&task.task_id, agent).await {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::warn!(task_id = %task.task_id, agent, error = %e, "claim failed after spawn, wrapper is running unclaimed");
            false
        }
    };

    Ok(SpawnOutcome { pid, lease, claimed })
}

fn kill_pid(pid: i32) {
    if let Err(e) = std::process::Command::new("kill").arg("-TERM").arg(pid.to_string()).status() {
        tracing::warn!(pid, error = %e, "failed to signal orphaned wrapper process after lease-write failure");
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
