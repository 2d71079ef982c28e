//! Turns one config entry into the remote operations that realize it.
//!
//! Planning is split in two: [`resolve_parent`] is the read-only lookup against Jira, and [`plan_entry`] is a pure
//! function from the entry plus its resolved parent to typed payloads. Moving an existing parent into the sprint is
//! left to the executor, so `plan` can be previewed without writing anything.

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::{
	error::{ImportError, ParentKind},
	jira::JiraClient,
	jira_config::{ConfigEntry, EntryType, NEW_DEV_TASK_KEY, SubTaskSpec},
	payload::{DEV_TASK_TYPE, IssuePayload, IssueUpdate, PayloadContext, STORY_TYPE},
};

/// Shown in previews where a sub-task's parent key only exists after creation.
pub const PENDING_PARENT_KEY: &str = "<created>";

/// What kind of parent a config key stands for. Exactly one holds for any validated entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
	#[display("epic")]
	Epic,
	#[display("story")]
	Story,
	/// Pre-existing dev task, used like a story.
	#[display("dev task")]
	DevTask,
	/// `n/a` entry: every issue becomes a new top-level dev task.
	#[display("new dev task")]
	NewDevTask,
}

impl Classification {
	pub fn classify(key: &str, entry_type: EntryType) -> Self {
		match entry_type {
			EntryType::Epic => Self::Epic,
			EntryType::Story => Self::Story,
			EntryType::DevTask if key == NEW_DEV_TASK_KEY => Self::NewDevTask,
			EntryType::DevTask => Self::DevTask,
		}
	}

	/// Only issues created at the top level carry sub-tasks.
	pub fn creates_sub_tasks(self) -> bool {
		matches!(self, Self::Epic | Self::NewDevTask)
	}

	/// Whether the parent itself is moved into the sprint, instead of each child.
	pub fn moves_parent_to_sprint(self) -> bool {
		matches!(self, Self::Story | Self::DevTask)
	}

	fn parent_kind(self) -> Option<ParentKind> {
		match self {
			Self::Epic => Some(ParentKind::Epic),
			Self::Story => Some(ParentKind::Story),
			Self::DevTask => Some(ParentKind::DevTask),
			Self::NewDevTask => None,
		}
	}

	/// Exact remote type name an existing parent must have, where one is checked.
	fn required_type(self) -> Option<&'static str> {
		match self {
			Self::Story => Some(STORY_TYPE),
			Self::DevTask => Some(DEV_TASK_TYPE),
			Self::Epic | Self::NewDevTask => None,
		}
	}
}

/// Existing remote entity an entry's issues hang off.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RemoteParent {
	pub key: String,
	/// Epic name, or issue summary.
	pub name: Option<String>,
	pub issue_type_name: String,
}

/// Look up the parent named by `key`. `None` for `n/a` entries, which have none.
#[instrument(skip(client))]
pub async fn resolve_parent(client: &dyn JiraClient, key: &str, classification: Classification) -> Result<Option<RemoteParent>> {
	let Some(kind) = classification.parent_kind() else {
		return Ok(None);
	};
	let not_found = || ImportError::ParentNotFound { kind, key: key.to_string() };

	if classification == Classification::Epic {
		let epic = client.fetch_epic(key).await.wrap_err_with(|| format!("Failed to look up epic {key}"))?.ok_or_else(not_found)?;
		return Ok(Some(RemoteParent {
			key: epic.key,
			name: epic.name.or(epic.summary),
			issue_type_name: "Epic".to_string(),
		}));
	}

	let issue = client.fetch_issue(key).await.wrap_err_with(|| format!("Failed to look up {kind} {key}"))?.ok_or_else(not_found)?;
	let type_name = issue.issue_type_name().unwrap_or_default();
	if Some(type_name) != classification.required_type() {
		tracing::debug!(key, found = type_name, "parent has the wrong issue type");
		return Err(not_found().into());
	}

	Ok(Some(RemoteParent {
		issue_type_name: type_name.to_string(),
		key: issue.key,
		name: issue.fields.summary,
	}))
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IssuePlan {
	/// Position within the entry's `issues`.
	pub index: usize,
	pub payload: IssuePayload,
	/// Epic to link the created issue to.
	pub link_to_epic: Option<String>,
	/// Created after the issue itself, under its new key.
	pub sub_tasks: Vec<SubTaskSpec>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryPlan {
	pub key: String,
	pub classification: Classification,
	pub parent: Option<RemoteParent>,
	/// Update putting the existing parent into the sprint, for stories and existing dev tasks.
	pub move_to_sprint: Option<IssueUpdate>,
	pub issues: Vec<IssuePlan>,
}

/// Build every payload for one entry. `parent` must come from [`resolve_parent`] for the same key.
pub fn plan_entry(ctx: &PayloadContext, key: &str, entry: &ConfigEntry, parent: Option<RemoteParent>) -> EntryPlan {
	let classification = Classification::classify(key, entry.entry_type);
	let parent_key = parent.as_ref().map(|p| p.key.as_str()).unwrap_or(key);

	let issues = entry
		.issues
		.iter()
		.enumerate()
		.map(|(index, issue)| {
			let payload = match classification {
				Classification::Epic => ctx.epic_child(issue),
				Classification::Story | Classification::DevTask => ctx.existing_parent_child(parent_key, issue),
				Classification::NewDevTask => ctx.new_dev_task(issue),
			};
			IssuePlan {
				index,
				payload,
				link_to_epic: (classification == Classification::Epic).then(|| parent_key.to_string()),
				sub_tasks: if classification.creates_sub_tasks() { issue.sub_tasks.clone() } else { vec![] },
			}
		})
		.collect();

	EntryPlan {
		key: key.to_string(),
		classification,
		move_to_sprint: classification.moves_parent_to_sprint().then(|| IssueUpdate::move_to_sprint(&ctx.sprint_field, ctx.sprint_id)),
		parent,
		issues,
	}
}

/// Resolve and plan one entry, read-only.
pub async fn plan_key(client: &dyn JiraClient, ctx: &PayloadContext, key: &str, entry: &ConfigEntry) -> Result<EntryPlan> {
	let classification = Classification::classify(key, entry.entry_type);
	let parent = resolve_parent(client, key, classification).await?;
	Ok(plan_entry(ctx, key, entry, parent))
}

impl EntryPlan {
	/// JSON preview of every request this entry would send, sub-task parents shown as [`PENDING_PARENT_KEY`].
	pub fn preview(&self, ctx: &PayloadContext) -> Value {
		let issues: Vec<Value> = self
			.issues
			.iter()
			.map(|issue| {
				let sub_tasks: Vec<IssuePayload> = issue.sub_tasks.iter().map(|s| ctx.sub_task(PENDING_PARENT_KEY, s)).collect();
				json!({
					"create": issue.payload,
					"link_to_epic": issue.link_to_epic,
					"sub_tasks": sub_tasks,
				})
			})
			.collect();

		json!({
			"key": self.key,
			"classification": self.classification,
			"parent": self.parent,
			"move_to_sprint": self.move_to_sprint,
			"issues": issues,
		})
	}
}
