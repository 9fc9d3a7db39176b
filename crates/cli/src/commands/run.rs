// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tinysched run` - the reconciliation loop (§4.6 Reconciler, §4.7 Daemon
//! Loop) wired up behind the exclusion lock (§4.5).
//!
//! `--once` (the default, cron-friendly) runs a single pass and exits;
//! `--daemon` repeats the pass on `loop_interval_sec`, sleeping in
//! one-second ticks so SIGINT/SIGTERM are noticed promptly without
//! interrupting an in-flight pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tsk_client::HttpTaskServiceClient;
use tsk_scheduler::{ConfigOverrides, PassStats, Reconciler};
use tsk_storage::{ExclusionLock, LeaseStore};

use crate::exit_error::ExitError;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
const CLIENT_MAX_RETRIES: u32 = 3;

pub async fn run(overrides: ConfigOverrides, once: bool) -> Result<()> {
    let config = super::resolve_config(overrides).map_err(|e| ExitError::new(1, e.to_string()))?;

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("{problem}");
        }
        return Err(ExitError::new(
            1,
            format!("{} configuration problem(s) found; run `validate-config` for details", problems.len()),
        )
        .into());
    }

    config
        .ensure_directories()
        .map_err(|e| ExitError::new(1, format!("failed to prepare state directories: {e}")))?;

    let lock = ExclusionLock::acquire(&config.lock_file).map_err(|e| {
        tracing::warn!(error = %e, "another instance holds the exclusion lock");
        ExitError::new(2, format!("another instance is already running: {e}"))
    })?;

    let client = HttpTaskServiceClient::new(config.mcp_endpoint.clone(), CLIENT_TIMEOUT, CLIENT_MAX_RETRIES);
    let lease_store = LeaseStore::new(config.running_dir.clone())
        .map_err(|e| ExitError::new(1, format!("failed to open lease store: {e}")))?;

    let dry_run = config.dry_run;
    let loop_interval = config.loop_interval_sec;
    let reconciler = Reconciler::new(config, client, lease_store);

    if once {
        let stats = reconciler.run_pass(dry_run).await;
        tracing::info!(?stats, "reconciliation pass complete");
        print_stats(&stats);
        drop(lock);
        return if stats.errors == 0 {
            Ok(())
        } else {
            Err(ExitError::new(1, format!("pass completed with {} error(s)", stats.errors)).into())
        };
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    install_signal_handlers(Arc::clone(&shutdown)).context("failed to install signal handlers")?;

    tracing::info!(loop_interval, "starting daemon loop");
    while !shutdown.load(Ordering::SeqCst) {
        let stats = reconciler.run_pass(dry_run).await;
        tracing::info!(?stats, "reconciliation pass complete");
        print_stats(&stats);

        let mut waited = 0u64;
        while waited < loop_interval && !shutdown.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            waited += 1;
        }
    }

    drop(lock);
    tracing::info!("shutdown signal received, exiting");
    Err(ExitError::new(130, "").into())
}

/// The final stats block §7 requires at the end of every pass, printed to
/// stdout (in addition to the structured log line) so cron's output capture
/// sees it directly without scraping the log file.
fn print_stats(stats: &PassStats) {
    println!(
        "pass complete: scanned={} reclaimed={} unassigned_matched={} assigned_spawned={} spawned={} errors={} legacy_path={}",
        stats.leases_scanned,
        stats.leases_reclaimed,
        stats.unassigned_matched,
        stats.assigned_spawned,
        stats.tasks_spawned,
        stats.errors,
        stats.used_legacy_path,
    );
}

#[cfg(unix)]
fn install_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        sigint.recv().await;
        tracing::info!("received SIGINT, finishing current pass then exiting");
        flag.store(true, Ordering::SeqCst);
    });

    tokio::spawn(async move {
        sigterm.recv().await;
        tracing::info!("received SIGTERM, finishing current pass then exiting");
        shutdown.store(true, Ordering::SeqCst);
    });

    Ok(())
}

#[cfg(not(unix))]
fn install_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}
