//! Calendar-availability command.

use dvcscraper::{AvailabilityOptions, Scraper};
use tracing::info;

pub async fn execute(
	scraper: &mut Scraper,
	resort: String,
	room_type: String,
	start: String,
	end: String,
	json: bool,
) -> anyhow::Result<()> {
	info!(target = "dvc", %resort, %room_type, "availability");

	scraper.open_booking().await?;
	let results = scraper
		.availability(&AvailabilityOptions {
			resort,
			room_type,
			start_date: start,
			end_date: end,
		})
		.await?;

	if json {
		println!("{}", serde_json::to_string_pretty(&results)?);
		return Ok(());
	}

	println!("{} / {}", results.resort_code, results.room_code);
	for day in &results.availability {
		println!("{}  rooms: {:<3}  points: {}", day.date, day.rooms, day.points);
	}
	Ok(())
}
