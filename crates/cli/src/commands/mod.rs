// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod config;
pub mod run;
pub mod validate_config;

use anyhow::{Context, Result};
use tsk_scheduler::{Config, ConfigOverrides};

/// Resolve configuration the same way every subcommand does: environment
/// first, then CLI overrides layered on top (never the reverse, per §6.6).
pub fn resolve_config(overrides: ConfigOverrides) -> Result<Config> {
    Config::from_env()
        .context("failed to resolve configuration from the environment")?
        .apply_overrides(&overrides)
        .context("failed to apply CLI configuration overrides")
}
