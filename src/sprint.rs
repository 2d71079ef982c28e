use color_eyre::eyre::Result;
use tracing::instrument;

use crate::{
	error::ImportError,
	jira::{JiraClient, Sprint, SprintState},
};

/// Sprints fetched per request; only the first active one is used.
const SPRINT_PAGE: u64 = 50;

/// The currently active sprint of the board named `board_name`.
#[instrument(skip(client))]
pub async fn active_sprint(client: &dyn JiraClient, board_name: &str) -> Result<Sprint> {
	tracing::info!("Retrieving active sprint details...");

	let boards = client.fetch_boards().await?;
	let board = boards
		.into_iter()
		.find(|b| b.name == board_name)
		.ok_or_else(|| ImportError::BoardNotFound { name: board_name.to_string() })?;

	let sprint = client
		.fetch_sprints(board.id, 0, SPRINT_PAGE, SprintState::Active)
		.await?
		.into_iter()
		.next()
		.ok_or(ImportError::NoActiveSprint { board_id: board.id })?;

	tracing::info!("Found active sprint: {} with id {}", sprint.name, sprint.id);
	Ok(sprint)
}
