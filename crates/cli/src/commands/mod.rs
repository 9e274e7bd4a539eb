//! Command implementations.
//!
//! Every command runs against one scraper whose session is persisted and
//! whose browser is torn down on both the success and the error path.

mod availability;
mod dashboard;
mod prices;

use dvcscraper::{Scraper, ScraperConfig};
use tracing::warn;

use crate::cli::Commands;

pub async fn dispatch(command: Commands, config: ScraperConfig) -> anyhow::Result<()> {
	let mut scraper = Scraper::launch(config).await?;

	let result = match command {
		Commands::Dashboard { output } => dashboard::execute(&mut scraper, &output).await,
		Commands::Prices { json } => prices::execute(&mut scraper, json).await,
		Commands::Availability { resort, room_type, start, end, json } => {
			availability::execute(&mut scraper, resort, room_type, start, end, json).await
		}
	};

	if let Err(err) = scraper.close().await {
		warn!(target = "dvc", error = %err, "failed to tear the browser down cleanly");
	}
	result
}
