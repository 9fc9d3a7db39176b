// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tinysched - file-backed task scheduler

mod commands;
mod exit_error;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tsk_scheduler::ConfigOverrides;

/// Global flags that apply before any subcommand resolves its config.
#[derive(Parser)]
#[command(name = "tinysched", version, about = "File-backed task scheduler reconciling a task queue against worker agents")]
struct Cli {
    /// Load environment variables from this file before resolving config
    #[arg(long = "env-file", global = true, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Override TINYSCHEDULER_BASE_PATH
    #[arg(long = "base-path", global = true, value_name = "PATH")]
    base_path: Option<PathBuf>,

    /// Override TINYSCHEDULER_LOG_LEVEL (e.g. info, debug, trace, or a tracing filter string)
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved configuration
    Config {
        /// Print as human-readable key/value lines (default)
        #[arg(long)]
        show: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the resolved configuration without running a pass
    ValidateConfig {
        /// Attempt to fix what can be fixed: create missing directories, seed a
        /// default agent control file
        #[arg(long)]
        fix: bool,
    },
    /// Run the reconciliation loop
    Run {
        /// Run exactly one pass and exit (default)
        #[arg(long, conflicts_with = "daemon")]
        once: bool,
        /// Run continuously until signaled
        #[arg(long, conflicts_with = "once")]
        daemon: bool,
        /// Compute matches and log them, but never assign, spawn, or reclaim
        #[arg(long)]
        dry_run: bool,
        /// Ignore blocked-task filtering in the ordering step
        #[arg(long)]
        disable_blocking: bool,
        /// Override one agent's capacity, repeatable (NAME=N)
        #[arg(long = "agent-limit", value_name = "NAME=N")]
        agent_limit: Vec<String>,

        #[arg(long, value_name = "PATH")]
        running_dir: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        log_dir: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        recipes_dir: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        goose_bin: Option<PathBuf>,
        #[arg(long, value_name = "URL")]
        mcp_endpoint: Option<String>,
        #[arg(long, value_name = "SECONDS")]
        loop_interval: Option<u64>,
        #[arg(long, value_name = "SECONDS")]
        heartbeat_interval: Option<u64>,
        #[arg(long, value_name = "SECONDS")]
        max_runtime: Option<i64>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e.downcast_ref::<exit_error::ExitError>().map_or(1, |c| c.code);
        let msg = e.to_string();
        if !msg.is_empty() {
            eprintln!("Error: {msg}");
        }
        std::process::exit(code);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path)
            .map_err(|e| anyhow::anyhow!("failed to load env file '{}': {e}", path.display()))?;
    }

    let overrides = ConfigOverrides {
        base_path: cli.base_path.clone(),
        log_level: cli.log_level.clone(),
        ..ConfigOverrides::default()
    };

    match cli.command {
        Commands::Config { show, json } => commands::config::run(overrides, show, json),
        Commands::ValidateConfig { fix } => commands::validate_config::run(overrides, fix).await,
        Commands::Run {
            once: _,
            daemon,
            dry_run,
            disable_blocking,
            agent_limit,
            running_dir,
            log_dir,
            recipes_dir,
            goose_bin,
            mcp_endpoint,
            loop_interval,
            heartbeat_interval,
            max_runtime,
        } => {
            let run_overrides = ConfigOverrides {
                running_dir,
                log_dir,
                recipes_dir,
                external_bin: goose_bin,
                mcp_endpoint,
                agent_limit,
                loop_interval_sec: loop_interval,
                heartbeat_interval_sec: heartbeat_interval,
                max_runtime_sec: max_runtime,
                dry_run,
                disable_blocking,
                ..overrides
            };
            commands::run::run(run_overrides, !daemon).await
        }
    }
}
