//! CLI surface specs (§6.5): help text and version for every subcommand.

use crate::prelude::*;

#[test]
fn no_args_shows_usage_and_exits_nonzero() {
    let harness = Harness::bare();
    harness.run(&[]).assert_stderr_has("Usage:");
}

#[test]
fn help_flag_shows_usage() {
    let harness = Harness::bare();
    harness.run(&["--help"]).assert_success().assert_stdout_has("Usage:");
}

#[test]
fn version_flag_shows_version() {
    let harness = Harness::bare();
    harness.run(&["--version"]).assert_success().assert_stdout_has("tinysched");
}

#[test]
fn config_help_shows_flags() {
    let harness = Harness::bare();
    harness
        .run(&["config", "--help"])
        .assert_success()
        .assert_stdout_has("--show")
        .assert_stdout_has("--json");
}

#[test]
fn validate_config_help_shows_fix_flag() {
    let harness = Harness::bare();
    harness
        .run(&["validate-config", "--help"])
        .assert_success()
        .assert_stdout_has("--fix");
}

#[test]
fn run_help_shows_subcommand_flags() {
    let harness = Harness::bare();
    harness
        .run(&["run", "--help"])
        .assert_success()
        .assert_stdout_has("--once")
        .assert_stdout_has("--daemon")
        .assert_stdout_has("--dry-run")
        .assert_stdout_has("--disable-blocking")
        .assert_stdout_has("--agent-limit");
}

#[test]
fn unknown_subcommand_fails_with_usage_error() {
    let harness = Harness::bare();
    harness.run(&["frobnicate"]).assert_stderr_has("error:");
}
