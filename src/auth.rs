use color_eyre::eyre::{Result, WrapErr};
use tracing::instrument;

use crate::{
	error::ImportError,
	jira::{CurrentUser, JiraClient},
	settings::Settings,
};

/// Confirm the session is authenticated and, when `company_domain` is set, that the operator belongs to it.
#[instrument(skip_all)]
pub async fn authenticate(client: &dyn JiraClient, settings: &Settings) -> Result<CurrentUser> {
	tracing::info!("Authenticating with Jira...");
	let user = client.fetch_current_user().await.wrap_err("Could not authenticate with Jira")?;

	if user.self_url.is_none() {
		return Err(ImportError::Authentication("Could not authenticate with Jira".to_string()).into());
	}
	if let Some(domain) = settings.company_domain.as_deref().filter(|d| !d.is_empty()) {
		let email = user.email_address.as_deref().unwrap_or_default();
		if !email.contains(domain) {
			return Err(ImportError::Authentication(format!("User is not a member of the {domain} domain")).into());
		}
	}

	tracing::info!(account_id = %user.account_id, "Authenticated with Jira successfully");
	Ok(user)
}
