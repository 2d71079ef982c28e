use std::{
	io::Write,
	path::{Path, PathBuf},
};

use clap::{Args, Parser, Subcommand};
use color_eyre::{
	Section,
	eyre::{Report, Result, WrapErr},
	owo_colors::OwoColorize,
};
use futures::future::join_all;
use jira_bulk::{
	BoxedJiraClient, ImportConfig, ImportError, InvalidConfig, MalformedDuration, RunLedger, RunOutcome, Settings, SettingsFlags, auth::authenticate, create_client,
	estimate::EstimateBreakdown, import, payload::PayloadContext, plan::plan_key, sprint::active_sprint,
};
use miette::Diagnostic;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
	#[clap(flatten)]
	settings: SettingsFlags,
	/// Use an in-memory Jira seeded from `JIRA_BULK_MOCK_STATE` instead of the configured host
	#[cfg(feature = "is_integration_test")]
	#[arg(long, global = true)]
	mock: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Check the import file, without contacting Jira
	Validate(FileArgs),
	/// Print per-entry and total estimates
	Estimate(FileArgs),
	/// Resolve parents and print every request an import would send. Writes nothing
	Plan(FileArgs),
	/// Create everything in the import file in the active sprint
	Import(ImportArgs),
}

#[derive(Args)]
struct FileArgs {
	#[arg(default_value = "jiraconfig.json")]
	file: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
	#[clap(flatten)]
	shared: FileArgs,
	/// Don't ask for confirmation
	#[arg(long, short)]
	yes: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	init_tracing()?;
	let cli = Cli::parse();
	let mock = mock_requested(&cli);

	let result = match cli.command {
		Commands::Validate(args) => validate(&args.file),
		Commands::Estimate(args) => estimate(&args.file),
		Commands::Plan(args) => plan(&cli.settings, mock, &args.file).await,
		Commands::Import(args) => run_import(&cli.settings, mock, &args.shared.file, args.yes).await,
	};

	result.map_err(|e| {
		tracing::error!("{e}");
		with_help(e)
	})
}

#[cfg(feature = "is_integration_test")]
fn mock_requested(cli: &Cli) -> bool {
	cli.mock
}

#[cfg(not(feature = "is_integration_test"))]
fn mock_requested(_cli: &Cli) -> bool {
	false
}

fn init_tracing() -> Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter);

	// JSON lines for inspecting runs after the fact; integration tests read these
	let file_layer = match std::env::var_os("JIRA_BULK_TRACE_FILE") {
		Some(path) => {
			let file = std::fs::File::create(&path).wrap_err_with(|| format!("Failed to create trace file {}", Path::new(&path).display()))?;
			Some(fmt::layer().json().with_writer(std::sync::Mutex::new(file)).with_filter(LevelFilter::DEBUG))
		}
		None => None,
	};

	tracing_subscriber::registry().with(stderr_layer).with(file_layer).init();
	Ok(())
}

/// Attach the diagnostic's help text, for the error kinds that carry one.
fn with_help(err: Report) -> Report {
	let help = if let Some(e) = err.downcast_ref::<InvalidConfig>() {
		e.help().map(|h| h.to_string())
	} else if let Some(e) = err.downcast_ref::<ImportError>() {
		e.help().map(|h| h.to_string())
	} else if let Some(e) = err.downcast_ref::<MalformedDuration>() {
		e.help().map(|h| h.to_string())
	} else {
		None
	};
	match help {
		Some(help) => err.with_suggestion(|| help),
		None => err,
	}
}

fn read_source(path: &Path) -> Result<String> {
	std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read config file {}", path.display()))
}

fn read_config(path: &Path) -> Result<ImportConfig> {
	Ok(ImportConfig::from_json(&read_source(path)?)?)
}

fn jira_client(flags: &SettingsFlags, mock: bool) -> Result<(Settings, BoxedJiraClient)> {
	let settings = Settings::load(flags)?;
	let client: BoxedJiraClient = match mock {
		#[cfg(feature = "is_integration_test")]
		true => std::sync::Arc::new(jira_bulk::MockJiraClient::from_env()?),
		_ => create_client(&settings)?,
	};
	Ok((settings, client))
}

fn validate(path: &Path) -> Result<()> {
	let config = read_config(path)?;
	println!("Configuration file is valid: {} entries, {} issues and sub-tasks", config.entries.len(), config.n_issues());
	Ok(())
}

fn estimate(path: &Path) -> Result<()> {
	let config = read_config(path)?;
	println!("{}", EstimateBreakdown::of(&config)?);
	Ok(())
}

async fn plan(flags: &SettingsFlags, mock: bool, path: &Path) -> Result<()> {
	let (settings, client) = jira_client(flags, mock)?;
	let user = authenticate(client.as_ref(), &settings).await?;
	let config = read_config(path)?;
	let sprint = active_sprint(client.as_ref(), &settings.board_name).await?;
	let ctx = PayloadContext::new(settings.project_key.clone(), settings.sprint_field.clone(), sprint.id, user.account_id);

	let plans = join_all(config.entries.iter().map(|(key, entry)| plan_key(client.as_ref(), &ctx, key, entry)))
		.await
		.into_iter()
		.collect::<Result<Vec<_>>>()?;
	let previews: Vec<serde_json::Value> = plans.iter().map(|p| p.preview(&ctx)).collect();
	println!("{}", serde_json::to_string_pretty(&previews)?);
	Ok(())
}

async fn run_import(flags: &SettingsFlags, mock: bool, path: &Path, yes: bool) -> Result<()> {
	let (settings, client) = jira_client(flags, mock)?;
	let source = read_source(path)?;
	let ledger = RunLedger::new();

	tracing::info!("Starting Jira issue creation script");
	let outcome = import::run(client.as_ref(), &settings, &source, &ledger, |prepared| {
		println!("{}", prepared.breakdown);
		if yes {
			return Ok(true);
		}
		confirm(&prepared.breakdown.total.to_string())
	})
	.await;

	match outcome {
		Ok(RunOutcome::Declined) => Ok(()),
		Ok(RunOutcome::Completed { n_created }) => {
			println!("Created {n_created} issues and sub-tasks");
			Ok(())
		}
		Err(e) => {
			if !ledger.is_empty()
				&& let Some(residual) = ledger.pending()
				&& !residual.is_empty()
			{
				for (position, record) in ledger.records() {
					tracing::warn!(entry = %position.entry, "{} was created at {}", record.remote_key, record.at);
				}
				tracing::warn!("{} remote issues were created before the failure; import this to finish the run:", ledger.len());
				println!("{}", residual.to_json_pretty());
			}
			Err(e)
		}
	}
}

fn confirm(total: &str) -> Result<bool> {
	print!("This is your total estimate: {}, proceed? [y/N] ", total.green());
	std::io::stdout().flush()?;

	let mut input = String::new();
	std::io::stdin().read_line(&mut input)?;
	let input = input.trim().to_lowercase();
	Ok(input == "y" || input == "yes")
}
