//! Error types for config validation and the import run.
//!
//! Uses miette for diagnostics; everything converts into `eyre::Report` at the orchestration layer,
//! so callers that care about the kind can `downcast_ref` back to these.

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use miette::Diagnostic;

/// The config file was rejected before any remote call was made.
#[derive(Debug, Diagnostic, Eq, PartialEq, thiserror::Error)]
pub enum InvalidConfig {
	#[error("Invalid config file, Dev Tasks with n/a key must be of type dev_task.")]
	#[diagnostic(code(jira_bulk::config::sentinel_type), help("the `n/a` entry has type `{found}`"))]
	SentinelNotDevTask { found: String },

	#[error("Invalid config file, Dev Tasks without an n/a key must have an empty subTasks array.")]
	#[diagnostic(
		code(jira_bulk::config::existing_dev_task_sub_tasks),
		help("entry `{key}` is an existing dev task; put its sub-tasks directly in `issues`")
	)]
	ExistingDevTaskWithSubTasks { key: String },

	#[error("Invalid config file, please refer to the sample config file.")]
	#[diagnostic(code(jira_bulk::config::schema), help("{at}: {detail}"))]
	Schema { at: String, detail: String },
}

impl InvalidConfig {
	pub fn schema(at: impl Into<String>, detail: impl std::fmt::Display) -> Self {
		Self::Schema {
			at: at.into(),
			detail: detail.to_string(),
		}
	}
}

/// What kind of existing parent an entry expected to find.
#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum ParentKind {
	#[display("epic")]
	Epic,
	#[display("story")]
	Story,
	#[display("dev task")]
	DevTask,
}

#[derive(Debug, Diagnostic, thiserror::Error)]
pub enum ImportError {
	#[error("{0}")]
	#[diagnostic(code(jira_bulk::auth), help("check JIRA_USER and JIRA_PW / JIRA_ACCESS_TOKEN"))]
	Authentication(String),

	#[error("Could not find {name} board")]
	#[diagnostic(code(jira_bulk::sprint::board_not_found), help("set JIRA_BOARD_NAME to the board that runs your sprints"))]
	BoardNotFound { name: String },

	#[error("Could not find any active sprints")]
	#[diagnostic(code(jira_bulk::sprint::no_active_sprint))]
	NoActiveSprint { board_id: u64 },

	#[error("Could not find {kind} with key {key}")]
	#[diagnostic(code(jira_bulk::plan::parent_not_found))]
	ParentNotFound { kind: ParentKind, key: String },

	#[error("Could not create issue {title}, error: {errors}")]
	#[diagnostic(code(jira_bulk::create::issue))]
	IssueCreation { title: String, errors: serde_json::Value },

	#[error("Could not create subtask {title}, error: {errors}")]
	#[diagnostic(code(jira_bulk::create::sub_task))]
	SubTaskCreation { title: String, errors: serde_json::Value },

	/// Never fails a run; only ever logged.
	#[error("Could not link epic {epic} to dev task {issue}. Please link them manually.")]
	#[diagnostic(code(jira_bulk::create::link), severity(Warning))]
	LinkCreation { epic: String, issue: String },
}
