//! Mock Jira client for testing purposes.
//!
//! This module provides a mock implementation of the JiraClient trait that stores
//! all data in memory, so the importer can be exercised end to end without hitting the real API.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Mutex,
		atomic::{AtomicU64, Ordering},
	},
};

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail, eyre};
use serde::Deserialize;
use tracing::instrument;

use crate::{
	jira::{Board, CreateOutcome, CreatedIssue, CurrentUser, Epic, JiraClient, RemoteIssue, RemoteIssueFields, RemoteIssueType, Sprint, SprintState},
	payload::{IssueLinkPayload, IssuePayload, IssueUpdate},
};

/// Internal representation of an issue in the mock
#[derive(Clone, Debug)]
pub struct MockIssueData {
	pub key: String,
	pub summary: String,
	pub issue_type: String,
	pub parent: Option<String>,
	pub sprint: Option<u64>,
	/// Body the issue was created with, if it was created through the client
	pub created_with: Option<IssuePayload>,
}

/// Seed for a mock started from the binary (`--mock`), read from the file named by `JIRA_BULK_MOCK_STATE`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MockState {
	pub account_id: Option<String>,
	pub email: Option<String>,
	pub project_key: Option<String>,
	pub boards: Vec<MockBoard>,
	pub epics: Vec<MockEpic>,
	pub issues: Vec<MockIssue>,
	pub reject_summaries: Vec<String>,
	pub fail_links: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MockBoard {
	pub id: u64,
	pub name: String,
	#[serde(default)]
	pub sprints: Vec<Sprint>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MockEpic {
	pub key: String,
	pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MockIssue {
	pub key: String,
	pub summary: String,
	pub issue_type: String,
}

/// Mock Jira client that stores all state in memory.
/// Thread-safe for use in async contexts.
pub struct MockJiraClient {
	user: CurrentUser,
	project_key: String,

	/// Counter for generating issue keys
	next_issue_number: AtomicU64,

	issues: Mutex<HashMap<String, MockIssueData>>,
	epics: Mutex<HashMap<String, Epic>>,
	boards: Mutex<Vec<Board>>,
	/// board_id -> sprints
	sprints: Mutex<HashMap<u64, Vec<Sprint>>>,
	/// (inward, outward) pairs
	links: Mutex<Vec<(String, String)>>,

	/// Summaries whose creation Jira should reject
	reject_summaries: Mutex<HashSet<String>>,
	fail_links: Mutex<bool>,

	/// Call log for debugging
	call_log: Mutex<Vec<String>>,
}

impl MockJiraClient {
	/// Create a new mock with an authenticated user and the project new issue keys are minted in
	pub fn new(account_id: &str, email: &str, project_key: &str) -> Self {
		Self {
			user: CurrentUser {
				self_url: Some(format!("https://mock.atlassian.net/rest/api/2/user?accountId={account_id}")),
				account_id: account_id.to_string(),
				email_address: Some(email.to_string()),
				display_name: None,
			},
			project_key: project_key.to_string(),
			next_issue_number: AtomicU64::new(100),
			issues: Mutex::new(HashMap::new()),
			epics: Mutex::new(HashMap::new()),
			boards: Mutex::new(Vec::new()),
			sprints: Mutex::new(HashMap::new()),
			links: Mutex::new(Vec::new()),
			reject_summaries: Mutex::new(HashSet::new()),
			fail_links: Mutex::new(false),
			call_log: Mutex::new(Vec::new()),
		}
	}

	/// Mock seeded from `JIRA_BULK_MOCK_STATE`, or an empty one when unset.
	#[cfg(feature = "is_integration_test")]
	pub fn from_env() -> Result<Self> {
		let Ok(state_file) = std::env::var("JIRA_BULK_MOCK_STATE") else {
			return Ok(Self::new("mock-account", "mock@example.com", "MOCK"));
		};
		let content = std::fs::read_to_string(&state_file).wrap_err_with(|| format!("Failed to read mock state from {state_file}"))?;
		let client = Self::from_state_json(&content)?;
		tracing::debug!(target: "mock_jira", %state_file, "loaded mock state");
		Ok(client)
	}

	pub fn from_state_json(content: &str) -> Result<Self> {
		let state: MockState = serde_json::from_str(content).wrap_err("Mock state is not correctly formatted")?;

		let client = Self::new(
			state.account_id.as_deref().unwrap_or("mock-account"),
			state.email.as_deref().unwrap_or("mock@example.com"),
			state.project_key.as_deref().unwrap_or("MOCK"),
		);
		for board in state.boards {
			client.boards.lock().unwrap().push(Board {
				id: board.id,
				name: board.name,
			});
			client.sprints.lock().unwrap().entry(board.id).or_default().extend(board.sprints);
		}
		for epic in &state.epics {
			client.add_epic(&epic.key, &epic.name);
		}
		for issue in &state.issues {
			client.add_issue(&issue.key, &issue.summary, &issue.issue_type);
		}
		for summary in &state.reject_summaries {
			client.reject_summary(summary);
		}
		if state.fail_links {
			client.fail_links();
		}

		Ok(client)
	}

	/// Replace the authenticated user, e.g. to simulate a session without `self`
	pub fn with_user(mut self, user: CurrentUser) -> Self {
		self.user = user;
		self
	}

	/// Add a board with one sprint in the given state
	pub fn add_board_with_sprint(&self, board_id: u64, board_name: &str, sprint_id: u64, sprint_name: &str, state: SprintState) {
		let mut boards = self.boards.lock().unwrap();
		if !boards.iter().any(|b| b.id == board_id) {
			boards.push(Board {
				id: board_id,
				name: board_name.to_string(),
			});
		}
		self.sprints.lock().unwrap().entry(board_id).or_default().push(Sprint {
			id: sprint_id,
			name: sprint_name.to_string(),
			state: Some(state.to_string()),
		});
	}

	/// Add a pre-existing issue
	pub fn add_issue(&self, key: &str, summary: &str, issue_type: &str) {
		self.issues.lock().unwrap().insert(
			key.to_string(),
			MockIssueData {
				key: key.to_string(),
				summary: summary.to_string(),
				issue_type: issue_type.to_string(),
				parent: None,
				sprint: None,
				created_with: None,
			},
		);
	}

	/// Add a pre-existing epic
	pub fn add_epic(&self, key: &str, name: &str) {
		let mut epics = self.epics.lock().unwrap();
		let id = epics.len() as u64 + 1;
		epics.insert(
			key.to_string(),
			Epic {
				id,
				key: key.to_string(),
				name: Some(name.to_string()),
				summary: Some(name.to_string()),
			},
		);
	}

	/// Make `create_issue` answer with an `errors` payload for this summary
	pub fn reject_summary(&self, summary: &str) {
		self.reject_summaries.lock().unwrap().insert(summary.to_string());
	}

	/// Make every `create_issue_link` call fail
	pub fn fail_links(&self) {
		*self.fail_links.lock().unwrap() = true;
	}

	pub fn issue(&self, key: &str) -> Option<MockIssueData> {
		self.issues.lock().unwrap().get(key).cloned()
	}

	/// Issues created through the client, ordered by key number
	pub fn created_issues(&self) -> Vec<MockIssueData> {
		let mut created: Vec<MockIssueData> = self.issues.lock().unwrap().values().filter(|i| i.created_with.is_some()).cloned().collect();
		created.sort_by_key(|i| key_number(&i.key));
		created
	}

	pub fn created_by_summary(&self, summary: &str) -> Option<MockIssueData> {
		self.created_issues().into_iter().find(|i| i.summary == summary)
	}

	pub fn links(&self) -> Vec<(String, String)> {
		self.links.lock().unwrap().clone()
	}

	/// Get the call log for debugging
	pub fn get_call_log(&self) -> Vec<String> {
		self.call_log.lock().unwrap().clone()
	}

	/// Number of logged calls whose name starts with `prefix`
	pub fn count_calls(&self, prefix: &str) -> usize {
		self.call_log.lock().unwrap().iter().filter(|c| c.starts_with(prefix)).count()
	}

	fn log_call(&self, call: &str) {
		self.call_log.lock().unwrap().push(call.to_string());
	}
}

fn key_number(key: &str) -> u64 {
	key.rsplit('-').next().and_then(|n| n.parse().ok()).unwrap_or(0)
}

#[async_trait]
impl JiraClient for MockJiraClient {
	#[instrument(skip(self), name = "MockJiraClient::fetch_current_user")]
	async fn fetch_current_user(&self) -> Result<CurrentUser> {
		tracing::info!(target: "mock_jira", "fetch_current_user");
		self.log_call("fetch_current_user()");
		Ok(self.user.clone())
	}

	#[instrument(skip(self), name = "MockJiraClient::fetch_issue")]
	async fn fetch_issue(&self, key: &str) -> Result<Option<RemoteIssue>> {
		tracing::info!(target: "mock_jira", key, "fetch_issue");
		self.log_call(&format!("fetch_issue({key})"));

		let issues = self.issues.lock().unwrap();
		Ok(issues.get(key).map(|data| RemoteIssue {
			key: data.key.clone(),
			fields: RemoteIssueFields {
				summary: Some(data.summary.clone()),
				issuetype: Some(RemoteIssueType { name: data.issue_type.clone() }),
			},
		}))
	}

	#[instrument(skip(self), name = "MockJiraClient::fetch_epic")]
	async fn fetch_epic(&self, key: &str) -> Result<Option<Epic>> {
		tracing::info!(target: "mock_jira", key, "fetch_epic");
		self.log_call(&format!("fetch_epic({key})"));
		Ok(self.epics.lock().unwrap().get(key).cloned())
	}

	#[instrument(skip(self), name = "MockJiraClient::fetch_boards")]
	async fn fetch_boards(&self) -> Result<Vec<Board>> {
		tracing::info!(target: "mock_jira", "fetch_boards");
		self.log_call("fetch_boards()");
		Ok(self.boards.lock().unwrap().clone())
	}

	#[instrument(skip(self), name = "MockJiraClient::fetch_sprints")]
	async fn fetch_sprints(&self, board_id: u64, start_at: u64, max_results: u64, state: SprintState) -> Result<Vec<Sprint>> {
		tracing::info!(target: "mock_jira", board_id, "fetch_sprints");
		self.log_call(&format!("fetch_sprints({board_id}, {start_at}, {max_results}, {state})"));

		let sprints = self.sprints.lock().unwrap();
		let state = state.to_string();
		Ok(sprints
			.get(&board_id)
			.map(|all| {
				all.iter()
					.filter(|s| s.state.as_deref() == Some(state.as_str()))
					.skip(start_at as usize)
					.take(max_results as usize)
					.cloned()
					.collect()
			})
			.unwrap_or_default())
	}

	#[instrument(skip(self, payload), name = "MockJiraClient::create_issue")]
	async fn create_issue(&self, payload: &IssuePayload) -> Result<CreateOutcome> {
		let summary = payload.summary();
		tracing::info!(target: "mock_jira", summary, "create_issue");
		self.log_call(&format!("create_issue({summary})"));

		if self.reject_summaries.lock().unwrap().contains(summary) {
			return Ok(CreateOutcome::Rejected(serde_json::json!({
				"errorMessages": [],
				"errors": { "summary": "rejected by mock" },
			})));
		}

		let mut issues = self.issues.lock().unwrap();
		if let Some(parent) = payload.parent_key()
			&& !issues.contains_key(parent)
		{
			return Ok(CreateOutcome::Rejected(serde_json::json!({
				"errorMessages": [],
				"errors": { "parent": format!("Issue {parent} does not exist") },
			})));
		}

		let number = self.next_issue_number.fetch_add(1, Ordering::SeqCst);
		let key = format!("{}-{number}", self.project_key);
		issues.insert(
			key.clone(),
			MockIssueData {
				key: key.clone(),
				summary: summary.to_string(),
				issue_type: payload.issue_type().to_string(),
				parent: payload.parent_key().map(str::to_string),
				sprint: payload.sprint_id(),
				created_with: Some(payload.clone()),
			},
		);

		Ok(CreateOutcome::Created(CreatedIssue { id: number.to_string(), key }))
	}

	#[instrument(skip(self, update), name = "MockJiraClient::update_issue")]
	async fn update_issue(&self, key: &str, update: &IssueUpdate) -> Result<()> {
		tracing::info!(target: "mock_jira", key, "update_issue");
		self.log_call(&format!("update_issue({key})"));

		let mut issues = self.issues.lock().unwrap();
		let issue = issues.get_mut(key).ok_or_else(|| eyre!("Issue not found: {key}"))?;
		issue.sprint = Some(update.fields.sprint_id);
		Ok(())
	}

	#[instrument(skip(self, link), name = "MockJiraClient::create_issue_link")]
	async fn create_issue_link(&self, link: &IssueLinkPayload) -> Result<()> {
		let (inward, outward) = (link.inward_issue.key.as_str(), link.outward_issue.key.as_str());
		tracing::info!(target: "mock_jira", inward, outward, "create_issue_link");
		self.log_call(&format!("create_issue_link({inward}, {outward})"));

		if *self.fail_links.lock().unwrap() {
			bail!("Failed to link issues: 400 - mock link failure");
		}
		self.links.lock().unwrap().push((inward.to_string(), outward.to_string()));
		Ok(())
	}
}
