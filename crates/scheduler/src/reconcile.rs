// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One reconciliation pass (§4.6): reclaim stale leases, then match queued
//! and directly-assigned tasks to agents with spare capacity and spawn a
//! wrapper for each match.
//!
//! The registry is the primary matching path (it knows which agents serve
//! which queue and lets several agents share a queue). If the agent control
//! file can't be loaded or reloaded, the pass falls back to a flat loop over
//! `Config::agent_limits` that treats every configured agent name as its own
//! queue — degraded, but still forward progress while the control file is
//! fixed. In dry-run mode the registry path still counts what it *would*
//! have matched; the legacy path does not act or count at all, since it has
//! no slot-accounting state worth reporting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tsk_client::TaskServiceClient;
use tsk_storage::lease_store::{FsLeaseWriter, LeaseStore, LeaseWriter, OsPidProbe, PidProbe};

use crate::config::Config;
use crate::ordering::order_candidates;
use crate::registry::AgentRegistry;
use crate::spawn::spawn_wrapper;

const QUEUE_FETCH_LIMIT: usize = 50;
const DIRECT_FETCH_LIMIT: usize = 50;

/// Outcome counters for a single pass. Printed in the daemon loop's log line
/// and returned as-is from `tinysched run --once`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PassStats {
    pub leases_scanned: usize,
    pub leases_reclaimed: usize,
    pub unassigned_matched: usize,
    pub assigned_spawned: usize,
    pub tasks_spawned: usize,
    pub errors: usize,
    pub used_legacy_path: bool,
}

/// Drives repeated reconciliation passes against a task service, lease
/// store, and agent registry.
pub struct Reconciler<C, W = FsLeaseWriter, P = OsPidProbe>
where
    C: TaskServiceClient,
    W: LeaseWriter,
    P: PidProbe,
{
    config: Config,
    client: C,
    lease_store: LeaseStore<W, P>,
    registry: Mutex<Option<Arc<AgentRegistry>>>,
}

impl<C, W, P> Reconciler<C, W, P>
where
    C: TaskServiceClient,
    W: LeaseWriter,
    P: PidProbe,
{
    pub fn new(config: Config, client: C, lease_store: LeaseStore<W, P>) -> Self {
        let registry = AgentRegistry::load(&config.agent_control_file)
            .map(Arc::new)
            .ok();
        Self {
            config,
            client,
            lease_store,
            registry: Mutex::new(registry),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one full pass: reclaim, then match via the registry path or the
    /// legacy fallback. Never panics on a single task's failure — every
    /// per-task error is counted and the pass moves on to the next
    /// candidate, since one bad match should not block the rest of the
    /// batch.
    pub async fn run_pass(&self, dry_run: bool) -> PassStats {
        let mut stats = PassStats::default();

        self.reclaim_stale(&mut stats).await;

        match self.refresh_registry() {
            Some(registry) => {
                stats.used_legacy_path = false;
                self.registry_pass(&registry, dry_run, &mut stats).await;
            }
            None => {
                stats.used_legacy_path = true;
                if !dry_run {
                    self.legacy_pass(&mut stats).await;
                }
            }
        }

        stats
    }

    /// Reload the cached registry, or load it fresh if it isn't cached yet.
    /// A failed reload keeps the pass on the legacy path rather than operate
    /// on a half-updated registry.
    fn refresh_registry(&self) -> Option<Arc<AgentRegistry>> {
        let mut guard = self.registry.lock();
        match guard.clone() {
            Some(registry) => {
                if registry.reload().is_ok() {
                    Some(registry)
                } else {
                    *guard = None;
                    None
                }
            }
            None => match AgentRegistry::load(&self.config.agent_control_file) {
                Ok(loaded) => {
                    let registry = Arc::new(loaded);
                    *guard = Some(Arc::clone(&registry));
                    Some(registry)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "agent control file unavailable, using legacy matching");
                    None
                }
            },
        }
    }

    /// Step 1-2: scan every lease, and unconditionally reclaim the ones
    /// whose owning process is dead or whose time budget has expired. This
    /// runs regardless of `dry_run` — a stale lease is stale data, not a
    /// scheduling decision.
    async fn reclaim_stale(&self, stats: &mut PassStats) {
        let all = self.lease_store.list_all();
        stats.leases_scanned = all.len();

        let stale = self
            .lease_store
            .find_stale_leases(self.config.max_runtime_sec, true);

        for entry in stale {
            if let Err(e) = self.client.requeue(&entry.lease.task_id, &entry.reason).await {
                tracing::warn!(task_id = %entry.lease.task_id, error = %e, "failed to requeue task behind a reclaimed lease");
                stats.errors += 1;
            }
            if self.lease_store.reclaim_lease(&entry.lease, &entry.reason) {
                stats.leases_reclaimed += 1;
            }
        }
    }

    /// Step 3-4 via the agent registry: one queue-sweep matching unassigned
    /// tasks against every agent servicing that queue, then a direct sweep
    /// spawning wrappers for tasks already assigned straight to an agent.
    async fn registry_pass(&self, registry: &AgentRegistry, dry_run: bool, stats: &mut PassStats) {
        for queue in registry.all_types() {
            let agents = registry.agents_by_type(&queue);
            if agents.is_empty() {
                continue;
            }

            let mut slots = self.available_slots(&agents);

            let unassigned = match self.client.get_unassigned_in_queue(&queue, QUEUE_FETCH_LIMIT).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::warn!(queue, error = %e, "failed to fetch unassigned tasks for queue");
                    stats.errors += 1;
                    continue;
                }
            };

            let ordered = order_candidates(unassigned, !self.config.disable_blocking);

            for task in ordered {
                let Some(agent) = best_agent(&slots, &agents) else {
                    break;
                };

                if dry_run {
                    stats.unassigned_matched += 1;
                    *slots.get_mut(&agent).expect("agent present in slots map") -= 1;
                    continue;
                }

                match self.client.assign(&task.task_id, &agent).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(task_id = %task.task_id, agent, "assign rejected by task service");
                        stats.errors += 1;
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(task_id = %task.task_id, agent, error = %e, "assign call failed");
                        stats.errors += 1;
                        continue;
                    }
                }

                match spawn_wrapper(&self.config, &self.lease_store, &self.client, &task, &agent).await {
                    Ok(_) => {
                        stats.unassigned_matched += 1;
                        stats.tasks_spawned += 1;
                        *slots.get_mut(&agent).expect("agent present in slots map") -= 1;
                    }
                    Err(e) => {
                        tracing::error!(task_id = %task.task_id, agent, error = %e, "failed to spawn wrapper for queued task");
                        stats.errors += 1;
                    }
                }
            }
        }

        let agent_names: HashSet<String> = registry.all_names().into_iter().collect();
        for agent in agent_names {
            self.direct_sweep_one(&agent, dry_run, stats).await;
        }
    }

    /// Spawn wrappers for tasks already assigned directly to `agent` and
    /// sitting idle, up to whatever capacity remains for it.
    async fn direct_sweep_one(&self, agent: &str, dry_run: bool, stats: &mut PassStats) {
        let limit = *self.config.agent_limits.get(agent).unwrap_or(&0) as i64;
        if limit <= 0 {
            return;
        }

        let active = self
            .lease_store
            .count_active_by_agent()
            .get(agent)
            .copied()
            .unwrap_or(0) as i64;
        let mut remaining = limit - active;
        if remaining <= 0 {
            return;
        }

        let idle = match self.client.list_idle(agent, DIRECT_FETCH_LIMIT).await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!(agent, error = %e, "failed to fetch idle tasks for agent");
                stats.errors += 1;
                return;
            }
        };

        let ordered = order_candidates(idle, !self.config.disable_blocking);

        for task in ordered {
            if remaining <= 0 {
                break;
            }

            if dry_run {
                stats.assigned_spawned += 1;
                remaining -= 1;
                continue;
            }

            match spawn_wrapper(&self.config, &self.lease_store, &self.client, &task, agent).await {
                Ok(_) => {
                    stats.assigned_spawned += 1;
                    stats.tasks_spawned += 1;
                    remaining -= 1;
                }
                Err(e) => {
                    tracing::error!(task_id = %task.task_id, agent, error = %e, "failed to spawn wrapper for directly assigned task");
                    stats.errors += 1;
                }
            }
        }
    }

    /// Flat-loop fallback used when the agent control file can't be read:
    /// every configured agent name is treated as its own queue, with no
    /// cross-agent slot sharing. Only runs outside dry-run mode.
    async fn legacy_pass(&self, stats: &mut PassStats) {
        let agent_names: Vec<String> = self.config.agent_limits.keys().cloned().collect();

        for agent in agent_names {
            let limit = *self.config.agent_limits.get(&agent).unwrap_or(&0) as i64;
            let active = self
                .lease_store
                .count_active_by_agent()
                .get(&agent)
                .copied()
                .unwrap_or(0) as i64;
            let mut remaining = limit - active;
            if remaining <= 0 {
                continue;
            }

            let mut candidates = match self.client.list_idle(&agent, remaining as usize).await {
                Ok(tasks) => tasks,
                Err(e) => {
                    tracing::warn!(agent, error = %e, "legacy pass: failed to list idle tasks");
                    stats.errors += 1;
                    Vec::new()
                }
            };

            match self.client.get_unassigned_in_queue(&agent, remaining as usize).await {
                Ok(tasks) => candidates.extend(tasks),
                Err(e) => {
                    tracing::warn!(agent, error = %e, "legacy pass: failed to list unassigned tasks");
                    stats.errors += 1;
                }
            }

            let ordered = order_candidates(candidates, !self.config.disable_blocking);

            for task in ordered {
                if remaining <= 0 {
                    break;
                }

                if task.agent.is_none() {
                    match self.client.assign(&task.task_id, &agent).await {
                        Ok(true) => {}
                        _ => {
                            stats.errors += 1;
                            continue;
                        }
                    }
                }

                match spawn_wrapper(&self.config, &self.lease_store, &self.client, &task, &agent).await {
                    Ok(_) => {
                        stats.assigned_spawned += 1;
                        stats.tasks_spawned += 1;
                        remaining -= 1;
                    }
                    Err(e) => {
                        tracing::error!(task_id = %task.task_id, agent, error = %e, "legacy pass: failed to spawn wrapper");
                        stats.errors += 1;
                    }
                }
            }
        }
    }

    fn available_slots(&self, agents: &[String]) -> HashMap<String, i64> {
        let active = self.lease_store.count_active_by_agent();
        agents
            .iter()
            .map(|name| {
                let limit = *self.config.agent_limits.get(name).unwrap_or(&0) as i64;
                let used = active.get(name).copied().unwrap_or(0) as i64;
                (name.clone(), (limit - used).max(0))
            })
            .collect()
    }
}

/// Agent with spare capacity that sorts highest by `(slots, name)` — ties
/// go to the alphabetically greatest name, mirroring the deterministic
/// tie-break the matching logic has always used.
fn best_agent(slots: &HashMap<String, i64>, ordered_names: &[String]) -> Option<String> {
    ordered_names
        .iter()
        .filter(|name| slots.get(name.as_str()).copied().unwrap_or(0) > 0)
        .max_by_key(|name| (slots[name.as_str()], (*name).clone()))
        .cloned()
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
