//! Calendar-availability queries through the booking workflow.
//!
//! The availability endpoint only answers inside an authenticated booking
//! session, so the form is driven first (dates, room type, search) and the
//! query itself runs as an in-page `fetch` that rides on the page's own
//! cookies and headers.

use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::{ViewScope, js_literal};
use crate::error::{Error, Result};
use crate::scraper::Scraper;

/// The date format the booking date picker uses in its `data-date` tags.
const PICKER_DATE_FORMAT: &str = "%m/%d/%Y";

/// Room capacity tag preselected while opening the booking form.
const DEFAULT_ROOM_CAPACITY: &str = "deluxe-studio";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityOptions {
	pub resort: String,
	pub room_type: String,
	pub start_date: String,
	pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityDay {
	pub date: String,
	pub rooms: i64,
	pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResults {
	pub resort_code: String,
	pub room_code: String,
	#[serde(default)]
	pub availability: Vec<AvailabilityDay>,
}

/// Wire shape of the calendar endpoint's request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarRequest<'a> {
	resort: &'a str,
	room_type: &'a str,
	start_date: &'a str,
	end_date: &'a str,
	parent_id: Option<()>,
	accessible: bool,
	is_modify: bool,
}

impl Scraper {
	/// Drives the booking form far enough that the calendar endpoint will
	/// answer: select a default date window and room type, then search.
	pub async fn open_booking(&mut self) -> Result<()> {
		let url = self.profile().booking_url.clone();
		let carousel = self.profile().calendar_carousel.clone();
		self.authenticated_navigate(&url, &carousel).await?;

		let (start, end) = booking_dates(Utc::now().date_naive());
		debug!(target = "dvc.booking", %start, %end, "selecting booking window");

		let start_day = self.profile().calendar_day(&start);
		let end_day = self.profile().calendar_day(&end);
		let room_button = self.profile().room_type_button(DEFAULT_ROOM_CAPACITY);
		let search = self.profile().check_availability_button.clone();
		let settle = self.profile().settle_timeout;

		self.driver().click(ViewScope::Top, &start_day).await?;
		self.driver().click(ViewScope::Top, &end_day).await?;
		self.driver().click(ViewScope::Top, &room_button).await?;

		self.driver().arm_settle().await;
		self.driver().click(ViewScope::Top, &search).await?;
		self.driver().wait_for_settle(settle).await?;
		info!(target = "dvc.booking", "booking search submitted");
		Ok(())
	}

	/// Queries the calendar-availability endpoint from within the page.
	///
	/// Call [`open_booking`](Scraper::open_booking) first; the endpoint
	/// rejects requests made outside an active booking flow.
	pub async fn availability(
		&mut self,
		options: &AvailabilityOptions,
	) -> Result<AvailabilityResults> {
		let body = CalendarRequest {
			resort: &options.resort,
			room_type: &options.room_type,
			start_date: &options.start_date,
			end_date: &options.end_date,
			parent_id: None,
			accessible: false,
			is_modify: false,
		};
		let expression = fetch_expression(&self.profile().calendar_url, &serde_json::to_string(&body)?);

		debug!(
			target = "dvc.booking",
			resort = %options.resort,
			room_type = %options.room_type,
			"querying calendar availability"
		);
		let value = self.driver().eval_json(ViewScope::Top, &expression).await?;
		serde_json::from_value(value.clone()).map_err(|err| {
			Error::Protocol(format!("unexpected availability response ({err}): {value}"))
		})
	}
}

/// The default booking window: seven months out, first of the month, five
/// nights.
fn booking_dates(today: NaiveDate) -> (String, String) {
	let start = today
		.checked_add_months(Months::new(7))
		.and_then(|date| date.with_day(1))
		.unwrap_or(today);
	let end = start.checked_add_days(Days::new(5)).unwrap_or(start);
	(
		start.format(PICKER_DATE_FORMAT).to_string(),
		end.format(PICKER_DATE_FORMAT).to_string(),
	)
}

fn fetch_expression(url: &str, body: &str) -> String {
	format!(
		"(async () => {{ const response = await fetch({url}, {{ \
		 method: 'POST', \
		 headers: {{ \
		 'Accept': 'application/json, text/plain, */*', \
		 'Content-Type': 'application/json;charset=utf-8', \
		 'Cache-Control': 'no-cache', \
		 'Pragma': 'no-cache' }}, \
		 body: {body} }}); \
		 return response.json(); }})()",
		url = js_literal(url),
		body = js_literal(body),
	)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn booking_window_is_seven_months_out_from_the_first() {
		let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
		let (start, end) = booking_dates(today);
		assert_eq!(start, "03/01/2027");
		assert_eq!(end, "03/06/2027");
	}

	#[test]
	fn booking_window_handles_year_carry() {
		let today = NaiveDate::from_ymd_opt(2026, 11, 30).unwrap();
		let (start, _) = booking_dates(today);
		assert_eq!(start, "06/01/2027");
	}

	#[test]
	fn the_request_body_matches_the_endpoint_shape() {
		let body = CalendarRequest {
			resort: "BLT",
			room_type: "4O",
			start_date: "2027-03-01",
			end_date: "2027-03-06",
			parent_id: None,
			accessible: false,
			is_modify: false,
		};
		let value = serde_json::to_value(&body).unwrap();
		assert_eq!(
			value,
			json!({
				"resort": "BLT",
				"roomType": "4O",
				"startDate": "2027-03-01",
				"endDate": "2027-03-06",
				"parentId": null,
				"accessible": false,
				"isModify": false
			})
		);
	}

	#[test]
	fn results_parse_from_the_endpoint_response() {
		let raw = json!({
			"resortCode": "BLT",
			"roomCode": "4O",
			"availability": [
				{"date": "2027-03-01", "rooms": 2, "points": 18},
				{"date": "2027-03-02", "rooms": 0, "points": 18}
			]
		});
		let results: AvailabilityResults = serde_json::from_value(raw).unwrap();
		assert_eq!(results.resort_code, "BLT");
		assert_eq!(results.availability.len(), 2);
		assert_eq!(results.availability[1].rooms, 0);
	}

	#[test]
	fn the_fetch_expression_embeds_url_and_body_as_literals() {
		let expression = fetch_expression("https://example.com/api", r#"{"resort":"BLT"}"#);
		assert!(expression.contains(r#"fetch("https://example.com/api""#));
		assert!(expression.contains(r#"body: "{\"resort\":\"BLT\"}""#));
	}
}
