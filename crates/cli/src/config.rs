//! Scraper configuration from CLI flags and the environment.

use anyhow::{Context, Result};
use dvcscraper::{Credentials, EngineConfig, ScraperConfig, SiteProfile};

use crate::cli::Cli;

const EMAIL_VAR: &str = "DVC_EMAIL";
const PASSWORD_VAR: &str = "DVC_PASSWORD";

/// Loads credentials from the environment. A local `.env` is honored when
/// present; already-exported variables win over it.
pub fn load_credentials() -> Result<Credentials> {
	let _ = dotenvy::dotenv();
	let email = std::env::var(EMAIL_VAR)
		.with_context(|| format!("{EMAIL_VAR} is not set"))?;
	let password = std::env::var(PASSWORD_VAR)
		.with_context(|| format!("{PASSWORD_VAR} is not set"))?;
	Ok(Credentials { email, password })
}

/// Builds the full scraper configuration for one command invocation.
pub fn scraper_config(cli: &Cli) -> Result<ScraperConfig> {
	let profile = SiteProfile {
		snapshot_dir: cli.snapshots.clone(),
		..SiteProfile::default()
	};
	Ok(ScraperConfig {
		profile,
		credentials: load_credentials()?,
		session_file: cli.session.clone(),
		engine: EngineConfig {
			binary: cli.browser.clone(),
			headless: !cli.headful,
			..EngineConfig::default()
		},
	})
}
