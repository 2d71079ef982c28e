//! Connection and behavior settings, layered: defaults < optional TOML file < environment.
//!
//! Environment variables keep the names operators already export: `JIRA_HOST`, `JIRA_PROJECT_KEY`, `JIRA_USER`,
//! `JIRA_PW` or `JIRA_ACCESS_TOKEN`, and `COMPANY_DOMAIN`. A `.env` file in the working directory is honored.

use std::path::{Path, PathBuf};

use clap::Args;
use color_eyre::eyre::{Result, WrapErr, eyre};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Deserializer};
use smart_default::SmartDefault;

#[derive(Clone, Debug, Default, Args)]
pub struct SettingsFlags {
	/// TOML file with settings; environment variables take precedence over it
	#[arg(long, global = true)]
	pub settings: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Settings {
	/// Jira host without scheme, e.g. `corp.atlassian.net`
	pub host: String,
	pub project_key: String,
	pub user: String,
	#[serde(alias = "pw")]
	pub password: Option<String>,
	pub access_token: Option<String>,
	/// Operator's email must contain this; no restriction when unset
	pub company_domain: Option<String>,
	#[default = "Development"]
	pub board_name: String,
	#[default = "customfield_10010"]
	pub sprint_field: String,
	#[default = "10003"]
	pub epic_link_type_id: String,
	/// Cap on in-flight remote calls; unbounded when unset
	#[serde(deserialize_with = "optional_count")]
	pub max_concurrency: Option<usize>,
}

impl Settings {
	pub fn load(flags: &SettingsFlags) -> Result<Self> {
		let _ = dotenvy::dotenv();
		Self::load_from(flags.settings.as_deref(), std::env::var("COMPANY_DOMAIN").ok(), None)
	}

	/// `env` replaces the process environment when given.
	fn load_from(file: Option<&Path>, company_domain: Option<String>, env: Option<Map<String, String>>) -> Result<Self> {
		let mut builder = Config::builder();
		if let Some(path) = file {
			builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
		}
		let settings: Settings = builder
			// Values stay strings: secrets such as `007` must reach basic auth untouched
			.add_source(Environment::with_prefix("JIRA").source(env))
			.set_override_option("company_domain", company_domain)?
			.build()
			.wrap_err("Failed to load settings")?
			.try_deserialize()
			.wrap_err("Settings are not correctly formatted")?;

		settings.check()?;
		Ok(settings)
	}

	fn check(&self) -> Result<()> {
		for (name, value, env) in [
			("host", &self.host, "JIRA_HOST"),
			("project_key", &self.project_key, "JIRA_PROJECT_KEY"),
			("user", &self.user, "JIRA_USER"),
		] {
			if value.is_empty() {
				return Err(eyre!("Missing setting `{name}`: set {env} or add it to the settings file"));
			}
		}
		if self.max_concurrency == Some(0) {
			return Err(eyre!("`max_concurrency` must be at least 1"));
		}
		self.secret()?;
		Ok(())
	}

	/// Password, falling back to the access token.
	pub fn secret(&self) -> Result<&str> {
		self.password
			.as_deref()
			.or(self.access_token.as_deref())
			.filter(|s| !s.is_empty())
			.ok_or_else(|| eyre!("Missing credentials: set JIRA_PW or JIRA_ACCESS_TOKEN"))
	}

	pub fn base_url(&self) -> String {
		let host = self.host.trim_end_matches('/');
		if host.starts_with("http://") || host.starts_with("https://") {
			host.to_string()
		} else {
			format!("https://{host}")
		}
	}

	/// Host as shown in browse links.
	pub fn display_host(&self) -> &str {
		self.host.trim_start_matches("https://").trim_start_matches("http://").trim_end_matches('/')
	}
}

/// Accepts a TOML integer or the string an environment variable carries.
fn optional_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<usize>, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Count {
		Number(usize),
		Text(String),
	}

	match Option::<Count>::deserialize(deserializer)? {
		None => Ok(None),
		Some(Count::Number(n)) => Ok(Some(n)),
		Some(Count::Text(s)) => s.trim().parse().map(Some).map_err(|_| serde::de::Error::custom(format!("`{s}` is not a count"))),
	}
}
