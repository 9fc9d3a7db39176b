//! Test helpers for tinysched's black-box CLI specs.
//!
//! These run the compiled `tinysched` binary against a temporary base
//! directory and a scripted mock task-service HTTP endpoint, and assert on
//! stdout/stderr/exit-code plus the lease files the binary writes to disk.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Resolve the path to the `tinysched` binary built alongside these tests.
fn binary_path() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/tinysched");
    if standard.exists() {
        return standard;
    }

    // Fallback: resolve relative to the test binary itself, which lives at
    // target/debug/deps/specs-<hash> - its grandparent is target/debug/.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("tinysched");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// A scratch `TINYSCHEDULER_BASE_PATH` plus a scripted mock task service,
/// wired together the way a real deployment's directories and endpoint
/// would be.
pub struct Harness {
    base: tempfile::TempDir,
    server: mockito::ServerGuard,
}

impl Harness {
    /// An empty base directory with no recipes, no agent control file, and
    /// nothing configured - exercises `validate-config`'s failure path.
    pub fn bare() -> Self {
        Self {
            base: tempfile::tempdir().expect("tempdir"),
            server: mockito::Server::new(),
        }
    }

    /// A base directory laid out the way `validate-config --fix` plus a
    /// populated agent roster would leave it: recipes dir present, an
    /// executable external binary configured, ready to run a pass.
    pub fn ready() -> Self {
        let harness = Self::bare();
        std::fs::create_dir_all(harness.recipes_dir()).expect("recipes dir");
        std::fs::create_dir_all(harness.running_dir()).expect("running dir");
        harness
    }

    pub fn base_path(&self) -> &Path {
        self.base.path()
    }

    pub fn recipes_dir(&self) -> PathBuf {
        self.base_path().join("recipes")
    }

    pub fn running_dir(&self) -> PathBuf {
        self.base_path().join("state/running")
    }

    pub fn agent_control_file(&self) -> PathBuf {
        self.base_path().join("config/agent-control.json")
    }

    pub fn server_url(&self) -> String {
        self.server.url()
    }

    /// Write the agent control file (§6.1) directly.
    pub fn write_agent_control(&self, json: &str) {
        let path = self.agent_control_file();
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, json).expect("write agent control");
    }

    /// Write a lease file directly, bypassing a real spawn - used to seed
    /// stale-lease and count-consistency scenarios.
    pub fn write_lease(&self, task_id: &str, json: &str) {
        std::fs::create_dir_all(self.running_dir()).expect("mkdir running");
        std::fs::write(self.running_dir().join(format!("task_{task_id}.json")), json).expect("write lease");
    }

    pub fn read_lease(&self, task_id: &str) -> Option<serde_json::Value> {
        let content = std::fs::read_to_string(self.running_dir().join(format!("task_{task_id}.json"))).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn lease_count(&self) -> usize {
        std::fs::read_dir(self.running_dir())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Stub a task-service tool call: any POST to `/tools/call` whose body
    /// contains `"tool":"<tool>"` gets `response_json` back with HTTP 200.
    pub fn mock_tool(&mut self, tool: &str, response_json: &str) -> mockito::Mock {
        self.server
            .mock("POST", "/tools/call")
            .match_body(mockito::Matcher::PartialJsonString(format!(r#"{{"tool":"{tool}"}}"#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_json)
            .create()
    }

    /// Stub the plain `GET /health` reachability probe used by
    /// `validate-config`.
    pub fn mock_health(&mut self, ok: bool) -> mockito::Mock {
        self.server
            .mock("GET", "/health")
            .with_status(if ok { 200 } else { 503 })
            .create()
    }

    /// Build a `tinysched` command scoped to this harness: base path and
    /// MCP endpoint point at the scratch directory and mock server;
    /// `/bin/true` stands in for the wrapper binary unless overridden.
    pub fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(binary_path());
        cmd.args(args);
        cmd.env("TINYSCHEDULER_BASE_PATH", self.base_path());
        cmd.env("TINYSCHEDULER_MCP_ENDPOINT", self.server_url());
        cmd.env("TINYSCHEDULER_GOOSE_BIN", "/bin/true");
        cmd.env("TINYSCHEDULER_LOG_LEVEL", "error");
        cmd.env_remove("TINYSCHEDULER_AGENT_LIMITS");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> RunAssert {
        let output = self.cmd(args).output().expect("command should run");
        RunAssert { output }
    }
}

/// Result of a CLI run, for chaining assertions against a real process's
/// stdout/stderr/exit code.
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn assert_success(self) -> Self {
        assert!(
            self.output.status.success(),
            "expected success, got {:?}\nstdout: {}\nstderr: {}",
            self.output.status.code(),
            self.stdout(),
            self.stderr()
        );
        self
    }

    pub fn assert_exit_code(self, code: i32) -> Self {
        assert_eq!(
            self.output.status.code(),
            Some(code),
            "stdout: {}\nstderr: {}",
            self.stdout(),
            self.stderr()
        );
        self
    }

    pub fn assert_stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(stdout.contains(expected), "stdout does not contain {expected:?}\nstdout: {stdout}");
        self
    }

    pub fn assert_stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(stderr.contains(expected), "stderr does not contain {expected:?}\nstderr: {stderr}");
        self
    }
}
