//! Total work estimate over a whole import file, shown to the operator before anything is written.

use std::fmt;

use crate::{
	duration::{Duration, MalformedDuration},
	jira_config::ImportConfig,
};

/// Every estimate in the file, in file order: for each entry, each issue's own estimate followed by its sub-tasks'.
pub fn all_estimates(config: &ImportConfig) -> impl Iterator<Item = &str> {
	config
		.entries
		.iter()
		.flat_map(|(_, entry)| &entry.issues)
		.flat_map(|issue| std::iter::once(issue.estimate.as_str()).chain(issue.sub_tasks.iter().map(|s| s.estimate.as_str())))
}

/// Sum a sequence of estimate strings and render the total. An empty sequence gives `""`.
pub fn total_of<'a>(estimates: impl IntoIterator<Item = &'a str>) -> Result<String, MalformedDuration> {
	let mut total = 0_u64;
	for estimate in estimates {
		total = total.saturating_add(estimate.parse::<Duration>()?.to_minutes());
	}
	Ok(crate::duration::format_minutes(total))
}

/// Grand total of every issue and sub-task estimate in `config`.
pub fn aggregate(config: &ImportConfig) -> Result<String, MalformedDuration> {
	total_of(all_estimates(config))
}

/// Per-entry subtotals plus the grand total.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EstimateBreakdown {
	pub per_entry: Vec<EntryEstimate>,
	pub total: Duration,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryEstimate {
	pub key: String,
	pub n_issues: usize,
	pub n_sub_tasks: usize,
	pub total: Duration,
}

impl EstimateBreakdown {
	pub fn of(config: &ImportConfig) -> Result<Self, MalformedDuration> {
		let mut per_entry = Vec::with_capacity(config.entries.len());
		for (key, entry) in &config.entries {
			let mut minutes = 0_u64;
			for issue in &entry.issues {
				minutes = minutes.saturating_add(issue.estimate.parse::<Duration>()?.to_minutes());
				for sub_task in &issue.sub_tasks {
					minutes = minutes.saturating_add(sub_task.estimate.parse::<Duration>()?.to_minutes());
				}
			}
			per_entry.push(EntryEstimate {
				key: key.clone(),
				n_issues: entry.issues.len(),
				n_sub_tasks: entry.issues.iter().map(|i| i.sub_tasks.len()).sum(),
				total: Duration::from_minutes(minutes),
			});
		}
		let total = per_entry.iter().map(|e| e.total).sum();
		Ok(Self { per_entry, total })
	}
}

impl fmt::Display for EstimateBreakdown {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let key_width = self.per_entry.iter().map(|e| e.key.len()).max().unwrap_or(0);
		for e in &self.per_entry {
			let total = if e.total.is_empty() { "-".to_string() } else { e.total.to_string() };
			writeln!(f, "{:<key_width$}  {} issue(s), {} sub-task(s)  {total}", e.key, e.n_issues, e.n_sub_tasks)?;
		}
		write!(f, "total: {}", self.total)
	}
}
