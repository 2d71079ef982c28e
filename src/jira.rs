use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr, bail};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::instrument;

use crate::{
	payload::{IssueLinkPayload, IssuePayload, IssueUpdate},
	settings::Settings,
};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
	/// Absent when the session isn't actually authenticated.
	#[serde(rename = "self")]
	pub self_url: Option<String>,
	pub account_id: String,
	pub email_address: Option<String>,
	pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoteIssue {
	pub key: String,
	#[serde(default)]
	pub fields: RemoteIssueFields,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RemoteIssueFields {
	pub summary: Option<String>,
	pub issuetype: Option<RemoteIssueType>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoteIssueType {
	pub name: String,
}

impl RemoteIssue {
	pub fn issue_type_name(&self) -> Option<&str> {
		self.fields.issuetype.as_ref().map(|t| t.name.as_str())
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Epic {
	pub id: u64,
	pub key: String,
	pub name: Option<String>,
	pub summary: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Board {
	pub id: u64,
	pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sprint {
	pub id: u64,
	pub name: String,
	pub state: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, derive_more::Display)]
pub enum SprintState {
	#[display("active")]
	Active,
	#[display("future")]
	Future,
	#[display("closed")]
	Closed,
}

/// Response from Jira when creating an issue
#[derive(Clone, Debug, Deserialize)]
pub struct CreatedIssue {
	pub id: String,
	pub key: String,
}

/// Jira either creates the issue or answers with an `errors` payload, which is kept verbatim.
#[derive(Clone, Debug)]
pub enum CreateOutcome {
	Created(CreatedIssue),
	Rejected(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
	values: Vec<T>,
	#[serde(default)]
	is_last: Option<bool>,
}

//==============================================================================
// Jira Client Trait
//==============================================================================

/// Every Jira operation the importer needs.
/// Implemented by the real REST client and by [`crate::mock_jira::MockJiraClient`].
#[async_trait]
pub trait JiraClient: Send + Sync {
	/// The user the session is authenticated as
	async fn fetch_current_user(&self) -> Result<CurrentUser>;

	/// Fetch an issue by key; `None` if it doesn't exist
	async fn fetch_issue(&self, key: &str) -> Result<Option<RemoteIssue>>;

	/// Fetch an epic by key; `None` if it doesn't exist or isn't an epic
	async fn fetch_epic(&self, key: &str) -> Result<Option<Epic>>;

	/// All boards visible to the user
	async fn fetch_boards(&self) -> Result<Vec<Board>>;

	/// One page of a board's sprints in the given state
	async fn fetch_sprints(&self, board_id: u64, start_at: u64, max_results: u64, state: SprintState) -> Result<Vec<Sprint>>;

	async fn create_issue(&self, payload: &IssuePayload) -> Result<CreateOutcome>;

	async fn update_issue(&self, key: &str, update: &IssueUpdate) -> Result<()>;

	async fn create_issue_link(&self, link: &IssueLinkPayload) -> Result<()>;
}

pub type BoxedJiraClient = Arc<dyn JiraClient>;

//==============================================================================
// Real Jira Client Implementation
//==============================================================================

/// Jira Cloud REST client (API v2 + agile 1.0), HTTP Basic auth.
pub struct RestJiraClient {
	http_client: Client,
	base_url: String,
	user: String,
	secret: String,
}

impl RestJiraClient {
	pub fn new(settings: &Settings) -> Result<Self> {
		let http_client = Client::builder()
			.user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
			.build()
			.wrap_err("Failed to build HTTP client")?;

		Ok(Self {
			http_client,
			base_url: settings.base_url(),
			user: settings.user.clone(),
			secret: settings.secret()?.to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{path}", self.base_url)
	}

	fn authed(&self, req: RequestBuilder) -> RequestBuilder {
		req.basic_auth(&self.user, Some(&self.secret)).header("Accept", "application/json")
	}

	/// GET that maps 404 to `None`.
	async fn get_optional<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Option<T>> {
		let res = self.authed(self.http_client.get(self.url(path))).send().await?;

		if res.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("Failed to fetch {what}: {status} - {body}");
		}

		Ok(Some(res.json::<T>().await.wrap_err_with(|| format!("Failed to parse {what}"))?))
	}

	async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
		match self.get_optional(path, what).await? {
			Some(v) => Ok(v),
			None => bail!("Failed to fetch {what}: 404 Not Found"),
		}
	}
}

#[async_trait]
impl JiraClient for RestJiraClient {
	#[instrument(skip(self), name = "RestJiraClient::fetch_current_user")]
	async fn fetch_current_user(&self) -> Result<CurrentUser> {
		let res = self.authed(self.http_client.get(self.url("/rest/api/2/myself"))).send().await?;

		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("Failed to fetch current user: {status} - {body}");
		}

		Ok(res.json::<CurrentUser>().await?)
	}

	#[instrument(skip(self), name = "RestJiraClient::fetch_issue")]
	async fn fetch_issue(&self, key: &str) -> Result<Option<RemoteIssue>> {
		self.get_optional(&format!("/rest/api/2/issue/{key}?fields=summary,issuetype"), "issue").await
	}

	#[instrument(skip(self), name = "RestJiraClient::fetch_epic")]
	async fn fetch_epic(&self, key: &str) -> Result<Option<Epic>> {
		self.get_optional(&format!("/rest/agile/1.0/epic/{key}"), "epic").await
	}

	#[instrument(skip(self), name = "RestJiraClient::fetch_boards")]
	async fn fetch_boards(&self) -> Result<Vec<Board>> {
		let mut boards = Vec::new();
		loop {
			let page: Page<Board> = self.get(&format!("/rest/agile/1.0/board?startAt={}", boards.len()), "boards").await?;
			let n = page.values.len();
			boards.extend(page.values);
			if n == 0 || page.is_last.unwrap_or(true) {
				break;
			}
		}
		tracing::debug!(n_boards = boards.len(), "fetched boards");
		Ok(boards)
	}

	#[instrument(skip(self), name = "RestJiraClient::fetch_sprints")]
	async fn fetch_sprints(&self, board_id: u64, start_at: u64, max_results: u64, state: SprintState) -> Result<Vec<Sprint>> {
		let path = format!("/rest/agile/1.0/board/{board_id}/sprint?startAt={start_at}&maxResults={max_results}&state={state}");
		let page: Page<Sprint> = self.get(&path, "sprints").await?;
		Ok(page.values)
	}

	#[instrument(skip(self, payload), fields(summary = payload.summary()), name = "RestJiraClient::create_issue")]
	async fn create_issue(&self, payload: &IssuePayload) -> Result<CreateOutcome> {
		tracing::debug!(payload = %serde_json::to_string(payload).unwrap_or_default(), "create_issue");
		let res = self.authed(self.http_client.post(self.url("/rest/api/2/issue"))).json(payload).send().await?;

		let status = res.status();
		if status.is_success() {
			return Ok(CreateOutcome::Created(res.json::<CreatedIssue>().await?));
		}

		let body = res.text().await.unwrap_or_default();
		match serde_json::from_str::<serde_json::Value>(&body) {
			Ok(errors) => Ok(CreateOutcome::Rejected(errors)),
			Err(_) => bail!("Failed to create issue: {status} - {body}"),
		}
	}

	#[instrument(skip(self, update), name = "RestJiraClient::update_issue")]
	async fn update_issue(&self, key: &str, update: &IssueUpdate) -> Result<()> {
		let res = self
			.authed(self.http_client.put(self.url(&format!("/rest/api/2/issue/{key}"))))
			.json(update)
			.send()
			.await?;

		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("Failed to update issue {key}: {status} - {body}");
		}

		Ok(())
	}

	#[instrument(skip(self, link), fields(inward = %link.inward_issue.key, outward = %link.outward_issue.key), name = "RestJiraClient::create_issue_link")]
	async fn create_issue_link(&self, link: &IssueLinkPayload) -> Result<()> {
		let res = self.authed(self.http_client.post(self.url("/rest/api/2/issueLink"))).json(link).send().await?;

		if !res.status().is_success() {
			let status = res.status();
			let body = res.text().await.unwrap_or_default();
			bail!("Failed to link issues: {status} - {body}");
		}

		Ok(())
	}
}

/// Create a Jira client from settings.
/// Returns an error if neither a password nor an access token is configured.
pub fn create_client(settings: &Settings) -> Result<BoxedJiraClient> {
	Ok(Arc::new(RestJiraClient::new(settings)?))
}

/// Browser link for an issue key.
pub fn browse_url(host: &str, key: &str) -> String {
	format!("https://{host}/browse/{key}")
}
