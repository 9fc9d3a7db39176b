// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured logging setup (§7, §9's "decorator/handler-chain" note): a
//! typed logger configured once at startup, never mutated globally again.
//! Console output gets severity colors when stderr is a tty; file output is
//! time-rotated daily and carries target/module and line so a stats block in
//! the log can be traced back to the pass that produced it.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialize the global subscriber from `level` (a bare level or a full
/// `tracing_subscriber::EnvFilter` directive string for per-module overrides)
/// and start a daily-rotating file appender under `log_dir`.
///
/// The returned [`WorkerGuard`] must be held for the lifetime of the process
/// — dropping it flushes and stops the background writer thread.
pub fn init(level: &str, log_dir: &Path) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("tinysched")
        .filename_suffix("log")
        .max_log_files(14)
        .build(log_dir)
        .map_err(|e| std::io::Error::other(format!("failed to start log rotation: {e}")))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let file_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()))
        .with_writer(std::io::stderr.with_max_level(tracing::Level::TRACE))
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(file_filter);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| std::io::Error::other(format!("failed to install tracing subscriber: {e}")))?;

    Ok(guard)
}
