// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tinysched config` - print the resolved configuration (§6.5).

use anyhow::Result;
use tsk_scheduler::ConfigOverrides;

use crate::exit_error::ExitError;

pub fn run(overrides: ConfigOverrides, _show: bool, json: bool) -> Result<()> {
    let config = super::resolve_config(overrides).map_err(|e| ExitError::new(1, e.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.to_json())?);
    } else {
        println!("{config}");
    }
    Ok(())
}
