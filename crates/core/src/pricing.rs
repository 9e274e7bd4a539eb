//! Purchase-price scraping for new direct contracts.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::driver::{ViewScope, js_literal};
use crate::error::Result;
use crate::profile::SiteProfile;
use crate::scraper::Scraper;

static PRICE_DIGITS: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").expect("static price pattern"));

/// A resort and its dollar-per-point price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResortPrice {
	pub name: String,
	pub price_per_point: f64,
}

/// One resort card as extracted from the rendered page.
#[derive(Debug, Deserialize)]
struct RawCard {
	name: String,
	price: String,
}

impl Scraper {
	/// Returns current pricing for new contracts.
	pub async fn purchase_prices(&mut self) -> Result<Vec<ResortPrice>> {
		let url = self.profile().add_on_url.clone();
		let cards_marker = self.profile().resort_cards.clone();
		self.authenticated_navigate(&url, &cards_marker).await?;

		let expression = cards_expression(self.profile());
		let value = self.driver().eval_json(ViewScope::Top, &expression).await?;
		let cards: Vec<RawCard> = serde_json::from_value(value)?;
		Ok(parse_prices(cards))
	}
}

fn cards_expression(profile: &SiteProfile) -> String {
	format!(
		"Array.from(document.querySelectorAll({cards})).map(card => ({{ \
		 name: (card.querySelector({name})?.innerText ?? '').trim(), \
		 price: (card.querySelector({price})?.innerText ?? '').trim() }}))",
		cards = js_literal(profile.resort_cards.as_str()),
		name = js_literal(profile.resort_name.as_str()),
		price = js_literal(profile.resort_price.as_str()),
	)
}

/// Parses the rendered card text into prices, skipping cards whose price
/// text carries no parseable number.
fn parse_prices(cards: Vec<RawCard>) -> Vec<ResortPrice> {
	let mut prices = Vec::with_capacity(cards.len());
	for card in cards {
		let parsed = PRICE_DIGITS
			.find(&card.price)
			.and_then(|digits| digits.as_str().parse::<f64>().ok());
		match parsed {
			Some(price_per_point) => {
				prices.push(ResortPrice { name: card.name, price_per_point });
			}
			None => {
				warn!(
					target = "dvc.pricing",
					name = %card.name,
					price = %card.price,
					"skipping card with unparseable price"
				);
			}
		}
	}
	prices
}
