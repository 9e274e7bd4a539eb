//! Purchase-price command.

use dvcscraper::Scraper;
use tracing::info;

pub async fn execute(scraper: &mut Scraper, json: bool) -> anyhow::Result<()> {
	info!(target = "dvc", "prices");
	let prices = scraper.purchase_prices().await?;

	if json {
		println!("{}", serde_json::to_string_pretty(&prices)?);
		return Ok(());
	}

	for price in &prices {
		println!("{:<58} ${:>6.2}/point", price.name, price.price_per_point);
	}
	Ok(())
}
