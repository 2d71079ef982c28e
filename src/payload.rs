//! Request bodies sent to Jira.
//!
//! The shape of a create-issue body depends on what kind of parent the issue hangs off, so there is one
//! builder per case instead of optional fields merged ad hoc. Every builder returns a complete [`IssuePayload`].

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::jira_config::{IssueSpec, SubTaskSpec};

pub const DEV_TASK_TYPE: &str = "Development Task";
pub const DEV_SUB_TASK_TYPE: &str = "Development Sub-task";
pub const STORY_TYPE: &str = "Story";

/// Everything a payload needs that doesn't come from the config file.
#[derive(Clone, Debug, Eq, PartialEq, derive_new::new)]
pub struct PayloadContext {
	pub project_key: String,
	/// Name of the custom field holding the sprint, e.g. `customfield_10010`.
	pub sprint_field: String,
	pub sprint_id: u64,
	/// Operator's own account id; every created issue is assigned to them.
	pub assignee_account_id: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IssuePayload {
	pub fields: IssueFields,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IssueFields {
	pub project: ProjectRef,
	#[serde(flatten)]
	pub sprint: Option<SprintField>,
	pub summary: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub issuetype: IssueTypeRef,
	pub assignee: AccountRef,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub parent: Option<IssueRef>,
	pub timetracking: TimeTracking,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProjectRef {
	pub key: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IssueTypeRef {
	pub name: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AccountRef {
	pub id: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IssueRef {
	pub key: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTracking {
	pub original_estimate: String,
	pub remaining_estimate: String,
}

impl TimeTracking {
	fn fresh(estimate: &str) -> Self {
		Self {
			original_estimate: estimate.to_string(),
			remaining_estimate: estimate.to_string(),
		}
	}
}

/// The sprint custom field. Its name differs between Jira instances, so it serializes as a one-entry map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SprintField {
	pub field: String,
	pub sprint_id: u64,
}

impl Serialize for SprintField {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(1))?;
		map.serialize_entry(&self.field, &self.sprint_id)?;
		map.end()
	}
}

impl IssuePayload {
	pub fn summary(&self) -> &str {
		&self.fields.summary
	}

	pub fn issue_type(&self) -> &str {
		&self.fields.issuetype.name
	}

	pub fn parent_key(&self) -> Option<&str> {
		self.fields.parent.as_ref().map(|p| p.key.as_str())
	}

	pub fn sprint_id(&self) -> Option<u64> {
		self.fields.sprint.as_ref().map(|s| s.sprint_id)
	}
}

impl PayloadContext {
	fn sprint(&self) -> SprintField {
		SprintField {
			field: self.sprint_field.clone(),
			sprint_id: self.sprint_id,
		}
	}

	fn fields(&self, summary: &str, description: Option<&str>, issue_type: &str, estimate: &str) -> IssueFields {
		IssueFields {
			project: ProjectRef { key: self.project_key.clone() },
			sprint: None,
			summary: summary.to_string(),
			description: description.map(str::to_string),
			issuetype: IssueTypeRef { name: issue_type.to_string() },
			assignee: AccountRef {
				id: self.assignee_account_id.clone(),
			},
			parent: None,
			timetracking: TimeTracking::fresh(estimate),
		}
	}

	/// Child of an epic: a top-level dev task placed in the sprint. The epic link is made separately after creation.
	pub fn epic_child(&self, issue: &IssueSpec) -> IssuePayload {
		let mut fields = self.fields(&issue.title, issue.description.as_deref(), DEV_TASK_TYPE, &issue.estimate);
		fields.sprint = Some(self.sprint());
		IssuePayload { fields }
	}

	/// Child of an existing story or dev task. No sprint field: the parent itself is moved into the sprint.
	pub fn existing_parent_child(&self, parent_key: &str, issue: &IssueSpec) -> IssuePayload {
		let mut fields = self.fields(&issue.title, issue.description.as_deref(), DEV_SUB_TASK_TYPE, &issue.estimate);
		fields.parent = Some(IssueRef { key: parent_key.to_string() });
		IssuePayload { fields }
	}

	/// A brand new top-level dev task (`n/a` entries).
	pub fn new_dev_task(&self, issue: &IssueSpec) -> IssuePayload {
		let mut fields = self.fields(&issue.title, issue.description.as_deref(), DEV_TASK_TYPE, &issue.estimate);
		fields.sprint = Some(self.sprint());
		IssuePayload { fields }
	}

	/// Sub-task of an issue created in this run. Sub-tasks never carry a description.
	pub fn sub_task(&self, parent_key: &str, sub_task: &SubTaskSpec) -> IssuePayload {
		let mut fields = self.fields(&sub_task.title, None, DEV_SUB_TASK_TYPE, &sub_task.estimate);
		fields.parent = Some(IssueRef { key: parent_key.to_string() });
		IssuePayload { fields }
	}
}

/// Partial update body, `{"fields": {...}}`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IssueUpdate {
	pub fields: SprintField,
}

impl IssueUpdate {
	pub fn move_to_sprint(sprint_field: &str, sprint_id: u64) -> Self {
		Self {
			fields: SprintField {
				field: sprint_field.to_string(),
				sprint_id,
			},
		}
	}
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueLinkPayload {
	#[serde(rename = "type")]
	pub link_type: LinkTypeRef,
	pub inward_issue: IssueRef,
	pub outward_issue: IssueRef,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LinkTypeRef {
	pub id: String,
}

impl IssueLinkPayload {
	pub fn new(link_type_id: &str, inward_key: &str, outward_key: &str) -> Self {
		Self {
			link_type: LinkTypeRef { id: link_type_id.to_string() },
			inward_issue: IssueRef { key: inward_key.to_string() },
			outward_issue: IssueRef { key: outward_key.to_string() },
		}
	}
}
