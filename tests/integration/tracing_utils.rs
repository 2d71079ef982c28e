//! Utilities for capturing and verifying tracing output in integration tests.
//!
//! When tests spawn the binary with `JIRA_BULK_TRACE_FILE` set, trace events are
//! written in JSON format to that file. These utilities help parse and verify
//! those traces.
//!
//! The mock client emits `tracing::info!` events with target "mock_jira"
//! that include method names and arguments. These can be verified using `has_mock_call`.

use std::{fs, path::Path};

use serde::Deserialize;

/// A single trace event from the JSON log
#[derive(Debug, Deserialize)]
pub struct TraceEvent {
	/// The log level (DEBUG, INFO, WARN, ERROR)
	pub level: String,
	/// The target module (e.g., "mock_jira")
	pub target: String,
	pub fields: TraceFields,
}

#[derive(Debug, Deserialize)]
pub struct TraceFields {
	pub message: Option<String>,
	/// Issue key (fetch_issue, fetch_epic, update_issue)
	pub key: Option<String>,
	/// Summary of a created issue (create_issue)
	pub summary: Option<String>,
	/// Link ends (create_issue_link)
	pub inward: Option<String>,
	pub outward: Option<String>,
}

/// Parsed trace log that provides verification methods
pub struct TraceLog {
	events: Vec<TraceEvent>,
}

impl TraceLog {
	/// Read and parse a trace log file
	pub fn from_file(path: &Path) -> Self {
		let content = fs::read_to_string(path).unwrap_or_default();
		let events: Vec<TraceEvent> = content.lines().filter(|line| !line.is_empty()).filter_map(|line| serde_json::from_str(line).ok()).collect();

		Self { events }
	}

	/// Check if a mock method was called (by looking for info events with target "mock_jira")
	pub fn has_mock_call(&self, method_name: &str) -> bool {
		self.mock_calls().iter().any(|e| e.fields.message.as_deref() == Some(method_name))
	}

	/// Check if a mock method was called for a given key or summary
	pub fn has_mock_call_for(&self, method_name: &str, subject: &str) -> bool {
		self.mock_calls().iter().any(|e| {
			e.fields.message.as_deref() == Some(method_name) && (e.fields.key.as_deref() == Some(subject) || e.fields.summary.as_deref() == Some(subject))
		})
	}

	pub fn count_mock_calls(&self, method_name: &str) -> usize {
		self.mock_calls().iter().filter(|e| e.fields.message.as_deref() == Some(method_name)).count()
	}

	/// `(inward, outward)` keys of every traced `create_issue_link`
	pub fn links(&self) -> Vec<(&str, &str)> {
		self.mock_calls()
			.iter()
			.filter(|e| e.fields.message.as_deref() == Some("create_issue_link"))
			.filter_map(|e| Some((e.fields.inward.as_deref()?, e.fields.outward.as_deref()?)))
			.collect()
	}

	/// Messages logged at the given level, from any target
	pub fn messages_at(&self, level: &str) -> Vec<&str> {
		self.events.iter().filter(|e| e.level == level).filter_map(|e| e.fields.message.as_deref()).collect()
	}

	/// Get all mock call events for debugging
	pub fn mock_calls(&self) -> Vec<&TraceEvent> {
		self.events.iter().filter(|e| e.target == "mock_jira" && e.level == "INFO").collect()
	}
}

/// Assert that a mock method was called
#[macro_export]
macro_rules! assert_traced {
	($log:expr, $method:expr) => {
		assert!(
			$log.has_mock_call($method),
			"Expected mock call '{}' to be traced, but it wasn't. Mock calls:\n{:#?}",
			$method,
			$log.mock_calls()
		);
	};
	($log:expr, $method:expr, $subject:expr) => {
		assert!(
			$log.has_mock_call_for($method, $subject),
			"Expected mock call '{}' for '{}' to be traced, but it wasn't. Mock calls:\n{:#?}",
			$method,
			$subject,
			$log.mock_calls()
		);
	};
}
