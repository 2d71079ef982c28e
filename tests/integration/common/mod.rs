//! Shared test infrastructure for integration tests.
//!
//! Provides `TestContext`, which handles:
//! - a temp working directory holding the import file
//! - running commands against the compiled binary with Jira settings in the environment
//! - mock Jira state for `--mock` runs, and the JSON trace file they write
//!
//! # Example
//!
//! ```ignore
//! let ctx = TestContext::new();
//! ctx.write_config(&json!({ "n/a": { "type": "dev_task", "issues": [] } }));
//!
//! let (status, stdout, stderr) = ctx.run(&["validate"]);
//! assert!(status.success());
//! ```

use std::{
	io::Write,
	path::PathBuf,
	process::{Command, ExitStatus, Stdio},
	sync::OnceLock,
};

use tempfile::TempDir;

use crate::tracing_utils::TraceLog;

pub const CONFIG_FILE: &str = "jiraconfig.json";

/// Environment variables the binary reads settings from; cleared so the host environment can't leak in.
const SETTINGS_ENV: &[&str] = &[
	"JIRA_HOST",
	"JIRA_PROJECT_KEY",
	"JIRA_USER",
	"JIRA_PW",
	"JIRA_ACCESS_TOKEN",
	"JIRA_BOARD_NAME",
	"JIRA_SPRINT_FIELD",
	"JIRA_EPIC_LINK_TYPE_ID",
	"JIRA_MAX_CONCURRENCY",
	"COMPANY_DOMAIN",
	"RUST_LOG",
];

static BINARY_COMPILED: OnceLock<()> = OnceLock::new();

/// Build the binary with `--mock` available before any test runs it
fn ensure_binary_compiled() {
	BINARY_COMPILED.get_or_init(|| {
		let status = Command::new(env!("CARGO"))
			.args(["build", "--features", "is_integration_test"])
			.current_dir(env!("CARGO_MANIFEST_DIR"))
			.status()
			.expect("Failed to execute cargo build");

		if !status.success() {
			panic!("Failed to build binary with is_integration_test feature");
		}
	});
}

fn get_binary_path() -> PathBuf {
	ensure_binary_compiled();

	let mut path = std::env::current_exe().unwrap();
	path.pop(); // Remove test binary name
	path.pop(); // Remove 'deps'
	path.push(env!("CARGO_PKG_NAME"));
	path
}

pub struct TestContext {
	pub dir: TempDir,
	/// Path to mock Jira state file (for `--mock` runs)
	pub mock_state_path: PathBuf,
	/// JSON-lines trace written by the binary
	pub trace_file: PathBuf,
}

impl TestContext {
	pub fn new() -> Self {
		let dir = tempfile::tempdir().unwrap();
		let mock_state_path = dir.path().join("mock_state.json");
		let trace_file = dir.path().join("trace.jsonl");
		Self { dir, mock_state_path, trace_file }
	}

	pub fn config_path(&self) -> PathBuf {
		self.dir.path().join(CONFIG_FILE)
	}

	pub fn write_config(&self, config: &serde_json::Value) {
		std::fs::write(self.config_path(), serde_json::to_string_pretty(config).unwrap()).unwrap();
	}

	pub fn write_config_str(&self, content: &str) {
		std::fs::write(self.config_path(), content).unwrap();
	}

	/// Set up the state the mock Jira starts from.
	pub fn setup_mock_state(&self, state: &serde_json::Value) {
		std::fs::write(&self.mock_state_path, serde_json::to_string_pretty(state).unwrap()).unwrap();
	}

	fn command(&self, args: &[&str]) -> Command {
		let mut cmd = Command::new(get_binary_path());
		cmd.args(args).current_dir(self.dir.path());
		for key in SETTINGS_ENV {
			cmd.env_remove(key);
		}
		cmd.env("JIRA_HOST", "corp.atlassian.net")
			.env("JIRA_PROJECT_KEY", "PROJ")
			.env("JIRA_USER", "me@corp.io")
			.env("JIRA_PW", "secret")
			.env("COMPANY_DOMAIN", "corp.io")
			.env("NO_COLOR", "1")
			.env("JIRA_BULK_MOCK_STATE", &self.mock_state_path)
			.env("JIRA_BULK_TRACE_FILE", &self.trace_file);
		cmd
	}

	/// Run a command. Returns (exit_status, stdout, stderr) for easy assertions.
	pub fn run(&self, args: &[&str]) -> (ExitStatus, String, String) {
		self.run_with_stdin(args, "")
	}

	/// Run a command, answering prompts with `input`.
	pub fn run_with_stdin(&self, args: &[&str], input: &str) -> (ExitStatus, String, String) {
		let mut child = self.command(args).stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn().unwrap();
		child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();

		let output = child.wait_with_output().unwrap();
		(
			output.status,
			String::from_utf8_lossy(&output.stdout).into_owned(),
			String::from_utf8_lossy(&output.stderr).into_owned(),
		)
	}

	pub fn trace(&self) -> TraceLog {
		TraceLog::from_file(&self.trace_file)
	}
}

/// Mock Jira with a Development board, an active sprint, and one parent of each kind.
pub fn default_mock_state() -> serde_json::Value {
	serde_json::json!({
		"account_id": "acc-1",
		"email": "me@corp.io",
		"project_key": "PROJ",
		"boards": [{ "id": 5, "name": "Development", "sprints": [{ "id": 37, "name": "Sprint 12", "state": "active" }] }],
		"epics": [{ "key": "PROJ-12", "name": "Auth" }],
		"issues": [
			{ "key": "PROJ-34", "summary": "Login", "issue_type": "Story" },
			{ "key": "PROJ-56", "summary": "Sessions", "issue_type": "Development Task" }
		]
	})
}
