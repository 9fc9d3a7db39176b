//! `tinysched config` specs (§6.5): print the resolved configuration.

use crate::prelude::*;

#[test]
fn show_prints_human_readable_config() {
    let harness = Harness::ready();
    harness
        .run(&["config", "--show"])
        .assert_success()
        .assert_stdout_has("TinyScheduler Configuration")
        .assert_stdout_has(&harness.base_path().display().to_string());
}

#[test]
fn json_prints_parseable_config() {
    let harness = Harness::ready();
    let assertion = harness.run(&["config", "--json"]).assert_success();
    let value: serde_json::Value = serde_json::from_str(&assertion.stdout()).expect("valid json");
    assert_eq!(value["base_path"], serde_json::Value::String(harness.base_path().display().to_string()));
    assert!(value["mcp_endpoint"].as_str().expect("endpoint").starts_with("http://"));
}

#[test]
fn base_path_flag_overrides_environment() {
    let harness = Harness::ready();
    let other = tempfile::tempdir().expect("tempdir");
    harness
        .cmd(&["config", "--show", "--base-path", &other.path().display().to_string()])
        .output()
        .map(|out| {
            let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
            assert!(stdout.contains(&other.path().display().to_string()));
            assert!(!stdout.contains(&harness.base_path().display().to_string()));
        })
        .expect("command should run");
}

#[test]
fn log_level_flag_overrides_environment() {
    let harness = Harness::ready();
    harness
        .run(&["--log-level", "debug", "config", "--json"])
        .assert_success()
        .assert_stdout_has("\"log_level\": \"debug\"");
}
