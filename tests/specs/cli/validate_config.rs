//! `tinysched validate-config` specs (§4.8): pre-flight checks, and `--fix`.

use crate::prelude::*;

#[test]
fn bare_environment_reports_missing_directories_and_binary() {
    let harness = Harness::bare();
    harness
        .run(&["validate-config"])
        .assert_exit_code(1)
        .assert_stderr_has("recipes directory does not exist");
}

#[test]
fn ready_environment_with_agents_and_reachable_service_is_valid() {
    let mut harness = Harness::ready();
    harness.write_agent_control(
        r#"[{"agentName":"vaela","agentType":"dev"},{"agentName":"damien","agentType":"dev"}]"#,
    );
    harness.mock_health(true);

    harness
        .run(&["validate-config"])
        .assert_success()
        .assert_stdout_has("configuration is valid");
}

#[test]
fn fix_creates_directories_and_seeds_default_agent_control() {
    let harness = Harness::bare();
    std::fs::create_dir_all(harness.base_path()).expect("base dir");

    harness.run(&["validate-config", "--fix"]);

    assert!(harness.running_dir().is_dir());
    assert!(harness.agent_control_file().is_file());
    let seeded = std::fs::read_to_string(harness.agent_control_file()).expect("read seeded control file");
    assert!(seeded.contains("dispatcher"));
    assert!(seeded.contains("architect"));
}

#[test]
fn fix_still_reports_unresolved_problems() {
    let harness = Harness::bare();
    // The recipes dir still won't exist even after --fix creates the state
    // directories - --fix seeds the agent roster, not a recipe library.
    harness
        .run(&["validate-config", "--fix"])
        .assert_exit_code(1)
        .assert_stderr_has("problem(s) remain after --fix");
}

#[test]
fn empty_agent_roster_is_reported_as_a_problem() {
    let harness = Harness::ready();
    harness.write_agent_control("[]");

    harness
        .run(&["validate-config"])
        .assert_exit_code(1)
        .assert_stderr_has("agent control file");
}
