//! Remote-site profile: entry points, locators, and timing bounds.
//!
//! Everything the session layer knows about the remote service's markup
//! lives here as data. The defaults describe the DVC member site.

use std::path::PathBuf;
use std::time::Duration;

use crate::locator::Locator;

const SIGN_IN_URL: &str = "https://disneyvacationclub.disney.go.com/sign-in/";
const HOME_URL: &str = "https://disneyvacationclub.disney.go.com/home/";
const ADD_ON_URL: &str = "https://disneyvacationclub.disney.go.com/add-vacation-points/";
const BOOKING_URL: &str = "https://disneyvacationclub.disney.go.com/booking/";
const CALENDAR_URL: &str =
	"https://disneyvacationclub.disney.go.com/booking-api/api/v1/calendar-availability";

#[derive(Debug, Clone)]
pub struct SiteProfile {
	pub sign_in_url: String,
	pub home_url: String,
	pub add_on_url: String,
	pub booking_url: String,
	pub calendar_url: String,

	/// Marker that only renders on the sign-in surface.
	pub sign_in_marker: Locator,
	/// Marker that only renders on an authenticated dashboard view.
	pub dashboard_marker: Locator,
	/// The embedded frame hosting the sign-in form.
	pub auth_frame: Locator,
	pub email_field: Locator,
	pub password_field: Locator,
	pub submit_button: Locator,
	/// Banner shown inside the auth frame on an explicit rejection.
	pub error_banner: Locator,

	pub resort_cards: Locator,
	pub resort_name: Locator,
	pub resort_price: Locator,
	pub calendar_carousel: Locator,
	pub room_type_panel: Locator,
	pub check_availability_button: Locator,

	/// Bound on the auth gate's poll for the sign-in marker.
	pub gate_timeout: Duration,
	/// Bound on the post-submit confirmation poll.
	pub success_timeout: Duration,
	/// Bound on navigation-settle waits.
	pub settle_timeout: Duration,

	/// Where diagnostic snapshots are written.
	pub snapshot_dir: PathBuf,
}

impl SiteProfile {
	/// Locator for one selectable day in the booking date picker.
	pub fn calendar_day(&self, date: &str) -> Locator {
		Locator::css(format!(
			"{} td[data-date='{}']",
			self.calendar_carousel.as_str(),
			date
		))
	}

	/// Locator for a room-type button by its capacity tag.
	pub fn room_type_button(&self, capacity: &str) -> Locator {
		Locator::css(format!(
			"{} button[data-capacity='{}']",
			self.room_type_panel.as_str(),
			capacity
		))
	}
}

impl Default for SiteProfile {
	fn default() -> Self {
		Self {
			sign_in_url: SIGN_IN_URL.to_string(),
			home_url: HOME_URL.to_string(),
			add_on_url: ADD_ON_URL.to_string(),
			booking_url: BOOKING_URL.to_string(),
			calendar_url: CALENDAR_URL.to_string(),

			sign_in_marker: Locator::css("body#registration_sign_in"),
			dashboard_marker: Locator::css(".homePageSeparator"),
			auth_frame: Locator::css(r#"iframe[id="disneyid-iframe"]"#),
			email_field: Locator::css(".field-username-email input"),
			password_field: Locator::css(".field-password input"),
			submit_button: Locator::css(".workflow-login .btn-submit"),
			error_banner: Locator::css(".banner.login.message-error.message.state-active"),

			resort_cards: Locator::css(".resort-tile"),
			resort_name: Locator::css(".resort-details h3"),
			resort_price: Locator::css(".resort-pricing"),
			calendar_carousel: Locator::css(
				".mobCoreDatepickerRange ul.carousel-wrapper li.carousel-slide",
			),
			room_type_panel: Locator::css("#mobBookingRoomType"),
			check_availability_button: Locator::css("button#checkAvailabilityBtn"),

			gate_timeout: Duration::from_secs(3),
			success_timeout: Duration::from_secs(15),
			settle_timeout: Duration::from_secs(30),

			snapshot_dir: PathBuf::from("."),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn calendar_day_scopes_to_the_carousel() {
		let profile = SiteProfile::default();
		assert_eq!(
			profile.calendar_day("03/01/2027").as_str(),
			".mobCoreDatepickerRange ul.carousel-wrapper li.carousel-slide td[data-date='03/01/2027']"
		);
	}

	#[test]
	fn room_type_button_carries_the_capacity_tag() {
		let profile = SiteProfile::default();
		assert_eq!(
			profile.room_type_button("deluxe-studio").as_str(),
			"#mobBookingRoomType button[data-capacity='deluxe-studio']"
		);
	}
}
