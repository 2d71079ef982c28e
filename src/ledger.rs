//! Record of what a run has already created, so a failed import can be finished by re-running on what is left.
//!
//! Entries are keyed by position in the import file: `(config key, issue index, sub-task index)`.
//! Recording is idempotent; the first remote key recorded for a position wins.

use std::{collections::BTreeMap, sync::Mutex};

use jiff::Timestamp;

use crate::jira_config::{ConfigEntry, EntryType, ImportConfig, IssueSpec};

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct LedgerKey {
	pub entry: String,
	pub issue: usize,
	pub sub_task: Option<usize>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreatedRecord {
	pub remote_key: String,
	pub at: Timestamp,
}

#[derive(Debug, Default)]
pub struct RunLedger {
	created: Mutex<BTreeMap<LedgerKey, CreatedRecord>>,
	/// Config the run is executing, set once execution starts.
	config: Mutex<Option<ImportConfig>>,
}

impl RunLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Remember the config being executed; [`Self::pending`] computes against it.
	pub fn begin(&self, config: &ImportConfig) {
		*self.config.lock().unwrap_or_else(|e| e.into_inner()) = Some(config.clone());
	}

	/// Returns `false` if the position was already recorded.
	pub fn record_issue(&self, entry: &str, issue: usize, remote_key: &str) -> bool {
		self.record(
			LedgerKey {
				entry: entry.to_string(),
				issue,
				sub_task: None,
			},
			remote_key,
		)
	}

	pub fn record_sub_task(&self, entry: &str, issue: usize, sub_task: usize, remote_key: &str) -> bool {
		self.record(
			LedgerKey {
				entry: entry.to_string(),
				issue,
				sub_task: Some(sub_task),
			},
			remote_key,
		)
	}

	fn record(&self, key: LedgerKey, remote_key: &str) -> bool {
		let mut created = self.created.lock().unwrap_or_else(|e| e.into_inner());
		if created.contains_key(&key) {
			return false;
		}
		tracing::debug!(entry = %key.entry, issue = key.issue, sub_task = ?key.sub_task, remote_key, "recorded");
		created.insert(
			key,
			CreatedRecord {
				remote_key: remote_key.to_string(),
				at: Timestamp::now(),
			},
		);
		true
	}

	pub fn issue_key(&self, entry: &str, issue: usize) -> Option<String> {
		self.lookup(entry, issue, None)
	}

	pub fn sub_task_key(&self, entry: &str, issue: usize, sub_task: usize) -> Option<String> {
		self.lookup(entry, issue, Some(sub_task))
	}

	fn lookup(&self, entry: &str, issue: usize, sub_task: Option<usize>) -> Option<String> {
		let key = LedgerKey {
			entry: entry.to_string(),
			issue,
			sub_task,
		};
		self.created.lock().unwrap_or_else(|e| e.into_inner()).get(&key).map(|r| r.remote_key.clone())
	}

	pub fn len(&self) -> usize {
		self.created.lock().unwrap_or_else(|e| e.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Everything recorded so far, ordered by position.
	pub fn records(&self) -> Vec<(LedgerKey, CreatedRecord)> {
		self.created.lock().unwrap_or_else(|e| e.into_inner()).iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}

	/// What is left of `config` after this run, as a config that can be imported on its own.
	///
	/// Issues never created stay under their key. An issue created without all of its sub-tasks becomes a `dev_task`
	/// entry keyed by its new remote key, holding the missing sub-tasks as issues.
	pub fn residual(&self, config: &ImportConfig) -> ImportConfig {
		let mut entries = Vec::new();

		for (key, entry) in &config.entries {
			let mut remaining = Vec::new();
			let mut orphaned = Vec::new();

			for (i, issue) in entry.issues.iter().enumerate() {
				let Some(remote_key) = self.issue_key(key, i) else {
					remaining.push(issue.clone());
					continue;
				};
				let missing: Vec<IssueSpec> = issue
					.sub_tasks
					.iter()
					.enumerate()
					.filter(|(j, _)| self.sub_task_key(key, i, *j).is_none())
					.map(|(_, s)| IssueSpec {
						title: s.title.clone(),
						estimate: s.estimate.clone(),
						description: None,
						sub_tasks: vec![],
					})
					.collect();
				if !missing.is_empty() {
					orphaned.push((
						remote_key,
						ConfigEntry {
							entry_type: EntryType::DevTask,
							issues: missing,
						},
					));
				}
			}

			if !remaining.is_empty() {
				entries.push((
					key.clone(),
					ConfigEntry {
						entry_type: entry.entry_type,
						issues: remaining,
					},
				));
			}
			entries.extend(orphaned);
		}

		ImportConfig { entries }
	}

	/// Residual of the config passed to [`Self::begin`], if execution ever started.
	pub fn pending(&self) -> Option<ImportConfig> {
		let config = self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()?;
		Some(self.residual(&config))
	}
}
