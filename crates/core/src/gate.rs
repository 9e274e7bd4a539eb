//! Authentication-state detection.

use std::time::Duration;

use tracing::debug;

use crate::driver::{Driver, Probe, ViewScope};
use crate::error::{Error, Result};
use crate::locator::Locator;

/// Decides whether the currently rendered view indicates a lapsed session.
#[derive(Debug, Clone)]
pub struct AuthGate {
	marker: Locator,
	timeout: Duration,
}

impl AuthGate {
	pub fn new(marker: Locator, timeout: Duration) -> Self {
		Self { marker, timeout }
	}

	/// Returns `true` when the view is showing the sign-in surface.
	///
	/// The poll is bounded by the gate's timeout. The bound elapsing without
	/// the marker is proof of authentication, not an inconclusive result;
	/// anything other than the bound elapsing surfaces as
	/// [`Error::ViewUnavailable`].
	pub async fn is_unauthenticated(&self, driver: &dyn Driver) -> Result<bool> {
		match driver
			.poll_element(ViewScope::Top, &self.marker, self.timeout)
			.await
		{
			Ok(Probe::Found) => {
				debug!(target = "dvc.gate", marker = %self.marker, "sign-in surface detected");
				Ok(true)
			}
			Ok(Probe::Absent) => Ok(false),
			Err(err @ Error::ViewUnavailable(_)) => Err(err),
			Err(err) => Err(Error::ViewUnavailable(err.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::time::Instant;

	use super::*;
	use crate::driver::scripted::ScriptedDriver;

	fn gate() -> AuthGate {
		AuthGate::new(Locator::css("body#registration_sign_in"), Duration::from_secs(3))
	}

	#[tokio::test(start_paused = true)]
	async fn visible_marker_means_unauthenticated() {
		let driver = ScriptedDriver::new();
		driver.add_element(&Locator::css("body#registration_sign_in"));
		assert!(gate().is_unauthenticated(&driver).await.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn absent_marker_means_authenticated() {
		let driver = ScriptedDriver::new();
		assert!(!gate().is_unauthenticated(&driver).await.unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn the_poll_never_outlives_its_bound() {
		let driver = ScriptedDriver::new();
		// Present, but far beyond the gate's bound.
		driver.add_element_after(
			&Locator::css("body#registration_sign_in"),
			Duration::from_secs(60),
		);

		let started = Instant::now();
		let unauthenticated = gate().is_unauthenticated(&driver).await.unwrap();
		assert!(!unauthenticated);
		assert!(started.elapsed() <= Duration::from_secs(4));
	}

	#[tokio::test(start_paused = true)]
	async fn a_broken_view_is_not_a_timeout() {
		let driver = ScriptedDriver::new();
		driver.break_view();
		let err = gate().is_unauthenticated(&driver).await.unwrap_err();
		assert!(matches!(err, Error::ViewUnavailable(_)));
	}
}
