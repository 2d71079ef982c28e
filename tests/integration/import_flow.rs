//! Full import runs against the in-memory Jira.

use jira_bulk::{
	ImportError, MockJiraClient, RunLedger, RunOutcome, Settings,
	import::{self, Prepared},
	jira::SprintState,
	payload::{DEV_SUB_TASK_TYPE, DEV_TASK_TYPE},
};
use serde_json::json;

fn settings() -> Settings {
	Settings {
		host: "corp.atlassian.net".to_string(),
		project_key: "PROJ".to_string(),
		user: "me@corp.io".to_string(),
		password: Some("pw".to_string()),
		company_domain: Some("corp.io".to_string()),
		..Default::default()
	}
}

fn client() -> MockJiraClient {
	let client = MockJiraClient::new("acc-1", "me@corp.io", "PROJ");
	client.add_board_with_sprint(5, "Development", 37, "Sprint 12", SprintState::Active);
	client.add_epic("PROJ-1", "Onboarding");
	client.add_issue("PROJ-2", "Login page", "Story");
	client.add_issue("PROJ-3", "Refactor auth", "Development Task");
	client
}

async fn run(client: &MockJiraClient, settings: &Settings, config: serde_json::Value, ledger: &RunLedger) -> color_eyre::eyre::Result<RunOutcome> {
	import::run(client, settings, &config.to_string(), ledger, |_: &Prepared| Ok(true)).await
}

#[tokio::test]
async fn epic_issue_and_sub_task_are_created_in_order() {
	let client = client();
	let ledger = RunLedger::new();
	let config = json!({ "PROJ-1": { "type": "epic", "issues": [
		{ "title": "A", "estimate": "2h", "subTasks": [{ "title": "A1", "estimate": "1h" }] }
	]}});

	let outcome = run(&client, &settings(), config, &ledger).await.unwrap();
	assert_eq!(outcome, RunOutcome::Completed { n_created: 2 });

	let a = client.created_by_summary("A").unwrap();
	assert_eq!(a.issue_type, DEV_TASK_TYPE);
	assert_eq!(a.sprint, Some(37));
	assert_eq!(a.parent, None);

	let a1 = client.created_by_summary("A1").unwrap();
	assert_eq!(a1.issue_type, DEV_SUB_TASK_TYPE);
	assert_eq!(a1.parent.as_deref(), Some(a.key.as_str()));
	assert_eq!(a1.created_with.unwrap().fields.description, None);

	// Created issue is the inward side, the epic the outward one
	assert_eq!(client.links(), [(a.key.clone(), "PROJ-1".to_string())]);
	assert_eq!(ledger.issue_key("PROJ-1", 0), Some(a.key));
}

#[tokio::test]
async fn story_is_moved_to_sprint_and_gets_sub_tasks() {
	let client = client();
	let ledger = RunLedger::new();
	let config = json!({ "PROJ-2": { "type": "story", "issues": [{ "title": "B", "estimate": "1d" }] } });

	run(&client, &settings(), config, &ledger).await.unwrap();

	assert_eq!(client.issue("PROJ-2").unwrap().sprint, Some(37));
	let created = client.created_issues();
	assert_eq!(created.len(), 1);
	assert_eq!(created[0].issue_type, DEV_SUB_TASK_TYPE);
	assert_eq!(created[0].parent.as_deref(), Some("PROJ-2"));
	assert_eq!(created[0].sprint, None);
	assert!(client.links().is_empty());
}

#[tokio::test]
async fn every_classification_in_one_run() {
	let client = client();
	let ledger = RunLedger::new();
	client.add_epic("PROJ-12", "Auth");
	client.add_issue("PROJ-34", "Login", "Story");
	client.add_issue("PROJ-56", "Sessions", "Development Task");
	let config = serde_json::from_str(include_str!("../../jiraconfig.sample.json")).unwrap();

	let outcome = run(&client, &settings(), config, &ledger).await.unwrap();
	assert_eq!(outcome, RunOutcome::Completed { n_created: 8 });
	assert_eq!(client.issue("PROJ-34").unwrap().sprint, Some(37));
	assert_eq!(client.issue("PROJ-56").unwrap().sprint, Some(37));
	assert_eq!(client.links().len(), 1);

	// Existing dev task: its issues become sub-tasks of it, outside the sprint
	let cookie = client.created_by_summary("Remove legacy session cookie").unwrap();
	assert_eq!(cookie.issue_type, DEV_SUB_TASK_TYPE);
	assert_eq!(cookie.parent.as_deref(), Some("PROJ-56"));
	assert_eq!(cookie.sprint, None);
	let body = serde_json::to_value(cookie.created_with.unwrap()).unwrap();
	assert_eq!(body["fields"]["parent"]["key"], "PROJ-56");
	assert!(body["fields"].get("customfield_10010").is_none(), "{body}");

	let upgrade = client.created_by_summary("Upgrade HTTP client").unwrap();
	assert_eq!(upgrade.sprint, Some(37));
	let bump = client.created_by_summary("Bump dependency").unwrap();
	assert_eq!(bump.parent, Some(upgrade.key));
}

#[tokio::test]
async fn link_failure_does_not_fail_the_issue() {
	let client = client();
	client.fail_links();
	let ledger = RunLedger::new();
	let config = json!({ "PROJ-1": { "type": "epic", "issues": [{ "title": "A", "estimate": "2h" }] } });

	let outcome = run(&client, &settings(), config, &ledger).await.unwrap();
	assert_eq!(outcome, RunOutcome::Completed { n_created: 1 });
	assert!(client.created_by_summary("A").is_some());
	assert_eq!(client.count_calls("create_issue_link"), 1);
}

#[tokio::test]
async fn missing_parent_fails_run_but_siblings_complete() {
	let client = client();
	let ledger = RunLedger::new();
	let config = json!({
		"PROJ-404": { "type": "epic", "issues": [{ "title": "lost", "estimate": "1h" }] },
		"n/a": { "type": "dev_task", "issues": [{ "title": "C", "estimate": "1h" }] },
	});

	let err = run(&client, &settings(), config, &ledger).await.unwrap_err();
	assert_eq!(err.to_string(), "Could not find epic with key PROJ-404");
	// No cancellation: the sibling entry still went through
	assert!(client.created_by_summary("C").is_some());
	assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn rejected_sub_task_leaves_residual_under_new_parent() {
	let client = client();
	client.reject_summary("C2");
	let ledger = RunLedger::new();
	let config = json!({ "n/a": { "type": "dev_task", "issues": [
		{ "title": "C", "estimate": "1w", "subTasks": [{ "title": "C1", "estimate": "1d" }, { "title": "C2", "estimate": "2d" }] },
		{ "title": "D", "estimate": "1h" }
	]}});

	let err = run(&client, &settings(), config, &ledger).await.unwrap_err();
	match err.downcast_ref::<ImportError>() {
		Some(ImportError::SubTaskCreation { title, errors }) => {
			assert_eq!(title, "C2");
			assert_eq!(errors, &json!({ "summary": "rejected by mock" }));
		}
		other => panic!("expected sub-task creation error, got {other:?}"),
	}
	assert_eq!(err.to_string(), r#"Could not create subtask C2, error: {"summary":"rejected by mock"}"#);

	let c = client.created_by_summary("C").unwrap();
	let residual = ledger.pending().unwrap();
	assert_eq!(serde_json::to_value(&residual).unwrap(), json!({ (c.key.clone()): { "type": "dev_task", "issues": [{ "title": "C2", "estimate": "2d" }] } }));

	// Re-running the residual targets the already created issue as an existing dev task
	let err = import::run(&client, &settings(), &residual.to_json_pretty(), &RunLedger::new(), |_| Ok(true)).await.unwrap_err();
	assert!(matches!(err.downcast_ref::<ImportError>(), Some(ImportError::IssueCreation { title, .. }) if title == "C2"));
	assert_eq!(client.issue(&c.key).unwrap().sprint, Some(37));
	assert_eq!(client.count_calls(&format!("update_issue({})", c.key)), 1);
}

#[tokio::test]
async fn rejected_issue_reports_title_and_payload() {
	let client = client();
	client.reject_summary("B");
	let ledger = RunLedger::new();
	let config = json!({ "PROJ-2": { "type": "story", "issues": [{ "title": "B", "estimate": "1d" }, { "title": "B2", "estimate": "1d" }] } });

	let err = run(&client, &settings(), config, &ledger).await.unwrap_err();
	assert!(matches!(err.downcast_ref::<ImportError>(), Some(ImportError::IssueCreation { title, .. }) if title == "B"));
	assert!(client.created_by_summary("B2").is_some());
	assert_eq!(ledger.pending().unwrap().entries[0].1.issues[0].title, "B");
}

#[tokio::test]
async fn declined_confirmation_writes_nothing() {
	let client = client();
	let ledger = RunLedger::new();
	let config = json!({ "n/a": { "type": "dev_task", "issues": [{ "title": "C", "estimate": "1h" }] } });

	let mut seen_total = String::new();
	let outcome = import::run(&client, &settings(), &config.to_string(), &ledger, |prepared| {
		seen_total = prepared.breakdown.total.to_string();
		Ok(false)
	})
	.await
	.unwrap();

	assert_eq!(outcome, RunOutcome::Declined);
	assert_eq!(seen_total, "1h");
	assert_eq!(client.count_calls("create_issue"), 0);
	assert_eq!(client.count_calls("fetch_boards"), 0);
	assert!(ledger.pending().is_none());
}

#[tokio::test]
async fn invalid_config_fails_before_any_write() {
	let client = client();
	let ledger = RunLedger::new();
	let config = json!({ "n/a": { "type": "story", "issues": [] } });

	let err = run(&client, &settings(), config, &ledger).await.unwrap_err();
	assert_eq!(err.to_string(), "Invalid config file, Dev Tasks with n/a key must be of type dev_task.");
	assert_eq!(client.get_call_log(), ["fetch_current_user()"]);
}

#[tokio::test]
async fn foreign_domain_fails_before_validation() {
	let client = MockJiraClient::new("acc-1", "me@elsewhere.org", "PROJ");
	let ledger = RunLedger::new();

	let err = run(&client, &settings(), json!("not even a config"), &ledger).await.unwrap_err();
	assert_eq!(err.to_string(), "User is not a member of the corp.io domain");
}

#[tokio::test]
async fn bounded_concurrency_still_creates_everything() {
	let client = client();
	let ledger = RunLedger::new();
	let settings = Settings {
		max_concurrency: Some(1),
		..settings()
	};
	let config = json!({ "n/a": { "type": "dev_task", "issues": [
		{ "title": "C", "estimate": "1h", "subTasks": [{ "title": "C1", "estimate": "1h" }, { "title": "C2", "estimate": "1h" }] },
		{ "title": "D", "estimate": "1h", "subTasks": [{ "title": "D1", "estimate": "1h" }] }
	]}});

	let outcome = run(&client, &settings, config, &ledger).await.unwrap();
	assert_eq!(outcome, RunOutcome::Completed { n_created: 5 });
}
