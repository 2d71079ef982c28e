//! The declarative import file (`jiraconfig.json`).
//!
//! A JSON object mapping a remote issue key (or `"n/a"`) to the kind of parent it is and the issues
//! to create under it:
//!
//! ```json
//! {
//!   "PROJ-12": { "type": "epic", "issues": [
//!     { "title": "Wire up auth", "estimate": "1d 4h", "description": "…",
//!       "subTasks": [ { "title": "Token refresh", "estimate": "2h" } ] }
//!   ] }
//! }
//! ```
//!
//! Parsing and validation are one step: [`ImportConfig::from_json`] either returns a fully typed config,
//! or the first violation found, in file order.

use serde::{Deserialize, Serialize, ser::SerializeMap};
use serde_json::Value;

use crate::{duration::Duration, error::InvalidConfig};

/// Key marking a dev task with no pre-existing remote parent.
pub const NEW_DEV_TASK_KEY: &str = "n/a";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
	#[display("epic")]
	Epic,
	#[display("story")]
	Story,
	#[display("dev_task")]
	DevTask,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigEntry {
	#[serde(rename = "type")]
	pub entry_type: EntryType,
	#[serde(default)]
	pub issues: Vec<IssueSpec>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IssueSpec {
	pub title: String,
	pub estimate: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, rename = "subTasks", skip_serializing_if = "Vec::is_empty")]
	pub sub_tasks: Vec<SubTaskSpec>,
}

/// Sub-tasks are leaves: no description, no further nesting.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubTaskSpec {
	pub title: String,
	pub estimate: String,
}

/// Validated import file, entries kept in file order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImportConfig {
	pub entries: Vec<(String, ConfigEntry)>,
}

impl ImportConfig {
	pub fn from_json(s: &str) -> Result<Self, InvalidConfig> {
		let value: Value = serde_json::from_str(s).map_err(|e| InvalidConfig::schema("file", e))?;
		Self::from_value(value)
	}

	/// Fail-fast: stops at the first offending entry.
	pub fn from_value(value: Value) -> Result<Self, InvalidConfig> {
		let Value::Object(map) = value else {
			return Err(InvalidConfig::schema("file", "top level must be an object keyed by issue key"));
		};

		let mut entries = Vec::with_capacity(map.len());
		for (key, raw) in map {
			let entry = validate_entry(&key, raw)?;
			entries.push((key, entry));
		}
		tracing::debug!(n_entries = entries.len(), "config validated");

		Ok(Self { entries })
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn n_issues(&self) -> usize {
		self.entries.iter().map(|(_, e)| e.issues.iter().map(|i| 1 + i.sub_tasks.len()).sum::<usize>()).sum()
	}

	pub fn to_json_pretty(&self) -> String {
		serde_json::to_string_pretty(self).unwrap_or_default()
	}
}

impl Serialize for ImportConfig {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (key, entry) in &self.entries {
			map.serialize_entry(key, entry)?;
		}
		map.end()
	}
}

fn validate_entry(key: &str, raw: Value) -> Result<ConfigEntry, InvalidConfig> {
	let raw_type = raw.get("type").and_then(Value::as_str);

	if key == NEW_DEV_TASK_KEY && raw_type != Some("dev_task") {
		return Err(InvalidConfig::SentinelNotDevTask {
			found: raw.get("type").map(Value::to_string).unwrap_or_else(|| "<missing>".to_string()),
		});
	}
	if key != NEW_DEV_TASK_KEY && raw_type == Some("dev_task") && declares_sub_tasks(&raw) {
		return Err(InvalidConfig::ExistingDevTaskWithSubTasks { key: key.to_string() });
	}

	let entry: ConfigEntry = serde_json::from_value(raw).map_err(|e| InvalidConfig::schema(format!("entry `{key}`"), e))?;
	check_structure(key, &entry)?;
	Ok(entry)
}

fn declares_sub_tasks(raw: &Value) -> bool {
	let Some(issues) = raw.get("issues").and_then(Value::as_array) else {
		return false;
	};
	issues.iter().any(|issue| issue.get("subTasks").and_then(Value::as_array).is_some_and(|s| !s.is_empty()))
}

/// The parts of the schema serde can't express: non-empty titles, estimate grammar, where nesting is allowed.
fn check_structure(key: &str, entry: &ConfigEntry) -> Result<(), InvalidConfig> {
	for (i, issue) in entry.issues.iter().enumerate() {
		let at = || format!("entry `{key}`, issue {}", i + 1);

		if issue.title.is_empty() {
			return Err(InvalidConfig::schema(at(), "`title` must not be empty"));
		}
		check_estimate(&issue.estimate).map_err(|detail| InvalidConfig::schema(at(), detail))?;

		if entry.entry_type == EntryType::Story && !issue.sub_tasks.is_empty() {
			return Err(InvalidConfig::schema(at(), "stories can not declare `subTasks`"));
		}

		for (j, sub_task) in issue.sub_tasks.iter().enumerate() {
			let at = || format!("entry `{key}`, issue {}, sub-task {}", i + 1, j + 1);
			if sub_task.title.is_empty() {
				return Err(InvalidConfig::schema(at(), "`title` must not be empty"));
			}
			check_estimate(&sub_task.estimate).map_err(|detail| InvalidConfig::schema(at(), detail))?;
		}
	}
	Ok(())
}

fn check_estimate(estimate: &str) -> Result<(), String> {
	estimate.parse::<Duration>().map(|_| ()).map_err(|e| format!("estimate `{estimate}`: {e}"))
}
