//! The import run: authenticate, validate, confirm, then create everything concurrently.
//!
//! Entries, the issues of an entry, and the sub-tasks of an issue all run concurrently. A sub-task is only sent once
//! its parent's key is known. Branches are never cancelled: when one fails, the others still run to completion and the
//! first error in file order is reported.

use color_eyre::eyre::{Result, WrapErr};
use futures::future::join_all;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::instrument;

use crate::{
	auth::authenticate,
	error::ImportError,
	estimate::EstimateBreakdown,
	jira::{CreateOutcome, CreatedIssue, CurrentUser, JiraClient, Sprint, browse_url},
	jira_config::{ConfigEntry, ImportConfig},
	ledger::RunLedger,
	payload::{IssueLinkPayload, IssuePayload, PayloadContext},
	plan::{EntryPlan, IssuePlan, plan_key},
	settings::Settings,
	sprint::active_sprint,
};

/// A validated config, ready for the operator's go-ahead.
#[derive(Clone, Debug)]
pub struct Prepared {
	pub user: CurrentUser,
	pub config: ImportConfig,
	pub breakdown: EstimateBreakdown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunOutcome {
	Declined,
	Completed { n_created: usize },
}

/// Authenticate, then validate `source` and total its estimates. Nothing is written.
pub async fn prepare(client: &dyn JiraClient, settings: &Settings, source: &str) -> Result<Prepared> {
	let user = authenticate(client, settings).await?;

	tracing::info!("Validating configuration file...");
	let config = ImportConfig::from_json(source)?;
	tracing::info!("Configuration file is valid, proceeding...");

	let breakdown = EstimateBreakdown::of(&config)?;
	Ok(Prepared { user, config, breakdown })
}

/// Look up the sprint and create every issue of `prepared`, recording each creation in `ledger`.
pub async fn execute(client: &dyn JiraClient, settings: &Settings, prepared: &Prepared, ledger: &RunLedger) -> Result<usize> {
	let sprint = active_sprint(client, &settings.board_name).await?;
	let ctx = PayloadContext::new(settings.project_key.clone(), settings.sprint_field.clone(), sprint.id, prepared.user.account_id.clone());
	let limiter = settings.max_concurrency.map(Semaphore::new);

	ledger.begin(&prepared.config);
	tracing::info!("Creating Jira issues...");

	let importer = Importer {
		client,
		ctx: &ctx,
		sprint: &sprint,
		host: settings.display_host(),
		epic_link_type_id: &settings.epic_link_type_id,
		limiter: limiter.as_ref(),
		ledger,
	};
	importer.run(&prepared.config).await?;

	Ok(ledger.len())
}

/// Full run. `confirm` sees the estimate breakdown and decides whether to go on.
pub async fn run(client: &dyn JiraClient, settings: &Settings, source: &str, ledger: &RunLedger, confirm: impl FnOnce(&Prepared) -> Result<bool>) -> Result<RunOutcome> {
	let prepared = prepare(client, settings, source).await?;

	if !confirm(&prepared)? {
		tracing::info!("Aborting...");
		return Ok(RunOutcome::Declined);
	}

	let n_created = execute(client, settings, &prepared, ledger).await?;
	tracing::info!(n_created, "All issues created");
	Ok(RunOutcome::Completed { n_created })
}

/// Everything the concurrent branches share.
struct Importer<'a> {
	client: &'a dyn JiraClient,
	ctx: &'a PayloadContext,
	sprint: &'a Sprint,
	host: &'a str,
	epic_link_type_id: &'a str,
	limiter: Option<&'a Semaphore>,
	ledger: &'a RunLedger,
}

impl Importer<'_> {
	async fn permit(&self) -> Option<SemaphorePermit<'_>> {
		match self.limiter {
			Some(semaphore) => semaphore.acquire().await.ok(),
			None => None,
		}
	}

	async fn run(&self, config: &ImportConfig) -> Result<()> {
		let results = join_all(config.entries.iter().map(|(key, entry)| self.import_entry(key, entry))).await;
		results.into_iter().collect()
	}

	#[instrument(skip(self, entry), name = "Importer::import_entry")]
	async fn import_entry(&self, key: &str, entry: &ConfigEntry) -> Result<()> {
		let plan = {
			let _permit = self.permit().await;
			plan_key(self.client, self.ctx, key, entry).await?
		};
		self.move_parent_to_sprint(&plan).await?;

		let name = plan.parent.as_ref().and_then(|p| p.name.as_deref()).unwrap_or(key);
		tracing::info!("Creating issues for {}: {name}", plan.classification);

		let results = join_all(plan.issues.iter().map(|issue| self.import_issue(&plan, issue))).await;
		results.into_iter().collect()
	}

	async fn move_parent_to_sprint(&self, plan: &EntryPlan) -> Result<()> {
		let Some(update) = &plan.move_to_sprint else {
			return Ok(());
		};
		let _permit = self.permit().await;
		self.client
			.update_issue(&plan.key, update)
			.await
			.wrap_err_with(|| format!("Could not add {} {} to sprint {}", plan.classification, plan.key, self.sprint.name))?;
		tracing::info!("Added {} {} to sprint {}", plan.classification, plan.key, self.sprint.name);
		Ok(())
	}

	async fn import_issue(&self, plan: &EntryPlan, issue: &IssuePlan) -> Result<()> {
		let title = issue.payload.summary();
		let created = match self.create(&issue.payload).await.wrap_err_with(|| format!("Could not create issue {title}"))? {
			CreateOutcome::Created(created) => created,
			CreateOutcome::Rejected(body) => {
				return Err(ImportError::IssueCreation {
					title: title.to_string(),
					errors: rejection_errors(body),
				}
				.into());
			}
		};
		self.ledger.record_issue(&plan.key, issue.index, &created.key);

		if let Some(epic) = &issue.link_to_epic {
			self.link_to_epic(epic, &created).await;
		}

		let url = browse_url(self.host, &created.key);
		if issue.sub_tasks.is_empty() {
			tracing::info!("Created issue {url}");
			return Ok(());
		}

		let results = join_all(issue.sub_tasks.iter().enumerate().map(|(j, sub_task)| {
			let payload = self.ctx.sub_task(&created.key, sub_task);
			async move {
				let sub_key = self.create_sub_task(&payload).await?;
				self.ledger.record_sub_task(&plan.key, issue.index, j, &sub_key);
				Ok::<_, color_eyre::eyre::Report>(())
			}
		}))
		.await;

		let n_created = results.iter().filter(|r| r.is_ok()).count();
		tracing::info!("Created issue {url} with {n_created} subtasks");
		results.into_iter().collect()
	}

	async fn create_sub_task(&self, payload: &IssuePayload) -> Result<String> {
		let title = payload.summary();
		match self.create(payload).await.wrap_err_with(|| format!("Could not create subtask {title}"))? {
			CreateOutcome::Created(created) => Ok(created.key),
			CreateOutcome::Rejected(body) => Err(ImportError::SubTaskCreation {
				title: title.to_string(),
				errors: rejection_errors(body),
			}
			.into()),
		}
	}

	async fn create(&self, payload: &IssuePayload) -> Result<CreateOutcome> {
		let _permit = self.permit().await;
		self.client.create_issue(payload).await
	}

	/// Failure only warns: the issue exists either way.
	async fn link_to_epic(&self, epic: &str, created: &CreatedIssue) {
		let link = IssueLinkPayload::new(self.epic_link_type_id, &created.key, epic);
		let result = {
			let _permit = self.permit().await;
			self.client.create_issue_link(&link).await
		};
		if let Err(e) = result {
			let warning = ImportError::LinkCreation {
				epic: epic.to_string(),
				issue: created.key.clone(),
			};
			tracing::warn!(error = %e, "{warning}");
		}
	}
}

/// The `errors` member of a rejection body, or the whole body when it has none.
fn rejection_errors(body: serde_json::Value) -> serde_json::Value {
	match body {
		serde_json::Value::Object(mut map) if map.contains_key("errors") => map.remove("errors").unwrap_or_default(),
		other => other,
	}
}
