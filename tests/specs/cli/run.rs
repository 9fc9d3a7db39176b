//! `tinysched run` specs: the reconciliation loop (§4.6) driven end-to-end
//! through the compiled binary, a scratch lease directory, and a scripted
//! HTTP task-service double. These are the §8 end-to-end scenarios,
//! exercised through the real wiring (CLI → HTTP client → reconciler →
//! lease store) rather than against fakes.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};

use crate::prelude::*;

const EMPTY_TASKS: &str = r#"{"tasks":[]}"#;
const UPDATE_OK: &str = r#"{"success":true}"#;

fn lease_json(task_id: &str, agent: &str, pid: i32, age: ChronoDuration) -> String {
    let started = (Utc::now() - age).to_rfc3339_opts(SecondsFormat::Secs, true);
    format!(
        r#"{{"task_id":"{task_id}","agent":"{agent}","pid":{pid},"recipe":"{agent}.yaml","started_at":"{started}","heartbeat":"{started}","host":"test-host","state":"running","metadata":{{}}}}"#
    )
}

#[test]
fn happy_path_matches_unassigned_tasks_to_queue_agents() {
    let mut harness = Harness::ready();
    harness.write_agent_control(
        r#"[{"agentName":"vaela","agentType":"dev"},{"agentName":"damien","agentType":"dev"}]"#,
    );
    harness.mock_tool("get_unassigned_in_queue", r#"{"tasks":[{"id":"1"},{"id":"2"},{"id":"3"}]}"#);
    harness.mock_tool("update_task", UPDATE_OK);
    harness.mock_tool("list_tasks", EMPTY_TASKS);

    harness
        .run(&["run", "--once", "--agent-limit", "vaela=2", "--agent-limit", "damien=2"])
        .assert_success()
        .assert_stdout_has("unassigned_matched=3")
        .assert_stdout_has("spawned=3")
        .assert_stdout_has("errors=0");

    assert_eq!(harness.lease_count(), 3);
}

#[test]
fn capacity_cap_only_fills_remaining_slots() {
    let mut harness = Harness::ready();
    harness.write_agent_control(
        r#"[{"agentName":"vaela","agentType":"dev"},{"agentName":"damien","agentType":"dev"}]"#,
    );
    // vaela already has one lease running - one slot of its limit of 2 is
    // taken before this pass starts.
    harness.write_lease("pre1", &lease_json("pre1", "vaela", 1, ChronoDuration::seconds(5)));
    harness.mock_tool(
        "get_unassigned_in_queue",
        r#"{"tasks":[{"id":"1"},{"id":"2"},{"id":"3"},{"id":"4"}]}"#,
    );
    harness.mock_tool("update_task", UPDATE_OK);
    harness.mock_tool("list_tasks", EMPTY_TASKS);

    harness
        .run(&["run", "--once", "--agent-limit", "vaela=2", "--agent-limit", "damien=2"])
        .assert_success()
        .assert_stdout_has("unassigned_matched=3")
        .assert_stdout_has("errors=0");

    // The pre-existing lease plus the three newly spawned ones.
    assert_eq!(harness.lease_count(), 4);
}

#[test]
fn stale_lease_is_reclaimed_and_requeued() {
    let mut harness = Harness::ready();
    // pid 1 (init) always exists, so this lease is stale purely on runtime,
    // matching the "started_at = now - 2h, maxRuntime = 1h" scenario.
    harness.write_lease("stale1", &lease_json("stale1", "vaela", 1, ChronoDuration::hours(2)));
    harness.mock_tool("update_task", UPDATE_OK);
    harness.mock_tool("list_tasks", EMPTY_TASKS);
    harness.mock_tool("get_unassigned_in_queue", EMPTY_TASKS);

    harness
        .run(&["run", "--once", "--agent-limit", "vaela=1", "--max-runtime", "3600"])
        .assert_success()
        .assert_stdout_has("reclaimed=1");

    assert!(harness.read_lease("stale1").is_none());
}

#[test]
fn dry_run_counts_matches_without_writing_leases_or_mutating_the_service() {
    let mut harness = Harness::ready();
    harness.write_agent_control(r#"[{"agentName":"vaela","agentType":"dev"}]"#);
    harness.mock_tool("get_unassigned_in_queue", r#"{"tasks":[{"id":"1"},{"id":"2"}]}"#);
    harness.mock_tool("list_tasks", EMPTY_TASKS);

    harness
        .run(&["run", "--once", "--dry-run", "--agent-limit", "vaela=2"])
        .assert_success()
        .assert_stdout_has("unassigned_matched=2");

    assert_eq!(harness.lease_count(), 0);
}

#[test]
fn missing_recipes_directory_fails_with_configuration_error() {
    let harness = Harness::bare();
    harness
        .run(&["run", "--once"])
        .assert_exit_code(1)
        .assert_stderr_has("configuration problem(s) found");
}

#[test]
fn second_concurrent_instance_exits_with_lock_contention_code() {
    let mut harness = Harness::ready();
    harness.write_agent_control(r#"[{"agentName":"vaela","agentType":"dev"}]"#);
    harness.mock_tool("get_unassigned_in_queue", EMPTY_TASKS);
    harness.mock_tool("list_tasks", EMPTY_TASKS);

    let mut holder = harness
        .cmd(&["run", "--daemon", "--loop-interval", "30", "--agent-limit", "vaela=1"])
        .spawn()
        .expect("spawn lock-holding daemon");

    // Give the daemon a moment to acquire the exclusion lock and finish its
    // first pass before the contending instance races it.
    std::thread::sleep(std::time::Duration::from_millis(400));

    harness
        .run(&["run", "--once", "--agent-limit", "vaela=1"])
        .assert_exit_code(2)
        .assert_stderr_has("another instance is already running");

    let _ = holder.kill();
    let _ = holder.wait();
}
