// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tinysched validate-config` - the Config Validator (§4.8) as a standalone
//! pre-flight check, runnable without starting a pass.

use anyhow::Result;
use tsk_client::{HttpTaskServiceClient, TaskServiceClient};
use tsk_scheduler::config::seed_default_agent_control;
use tsk_scheduler::{AgentRegistry, ConfigOverrides};

use crate::exit_error::ExitError;

pub async fn run(overrides: ConfigOverrides, fix: bool) -> Result<()> {
    let config = super::resolve_config(overrides).map_err(|e| ExitError::new(1, e.to_string()))?;

    if fix {
        if let Err(e) = config.ensure_directories() {
            eprintln!("warning: could not create one or more directories: {e}");
        }
        match seed_default_agent_control(&config.agent_control_file) {
            Ok(true) => println!("seeded default agent control file at {}", config.agent_control_file.display()),
            Ok(false) => {}
            Err(e) => eprintln!("warning: could not seed agent control file: {e}"),
        }
    }

    let mut problems: Vec<String> = config.validate().into_iter().map(|e| e.to_string()).collect();

    match AgentRegistry::load(&config.agent_control_file) {
        Ok(registry) => {
            if registry.all_names().is_empty() {
                problems.push("agent control file contains no agents".to_string());
            }
        }
        Err(e) => problems.push(format!("agent control file: {e}")),
    }

    let client = HttpTaskServiceClient::new(&config.mcp_endpoint, std::time::Duration::from_secs(5), 1);
    match client.health_check().await {
        Ok(true) => {}
        Ok(false) => eprintln!("warning: task-service health check returned non-success at {}", config.mcp_endpoint),
        Err(e) => eprintln!("warning: task-service reachability check failed: {e}"),
    }

    if problems.is_empty() {
        println!("configuration is valid");
        return Ok(());
    }

    for problem in &problems {
        eprintln!("error: {problem}");
    }

    if fix {
        Err(ExitError::new(1, format!("{} problem(s) remain after --fix", problems.len())).into())
    } else {
        Err(ExitError::new(1, format!("{} configuration problem(s) found", problems.len())).into())
    }
}
