//! Dashboard capture command.

use std::path::Path;

use dvcscraper::Scraper;
use tracing::info;

pub async fn execute(scraper: &mut Scraper, output: &Path) -> anyhow::Result<()> {
	let home = scraper.profile().home_url.clone();
	let marker = scraper.profile().dashboard_marker.clone();
	info!(target = "dvc", url = %home, "dashboard");

	scraper.authenticated_navigate(&home, &marker).await?;
	scraper.screenshot(output).await?;

	println!("Saved dashboard to {}", output.display());
	Ok(())
}
