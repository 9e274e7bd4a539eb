//! The login protocol: a linear sequence of steps that submits credentials
//! into the embedded auth frame and classifies the outcome.
//!
//! Structural failures (login surface unreachable, frame or fields gone)
//! abort immediately. Only the confirmation bound elapsing leads to
//! classification: an explicit rejection banner makes the failure certain;
//! anything else stays ambiguous, because a slow network and a changed
//! success marker are indistinguishable from here.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::driver::{Driver, Probe, ViewScope};
use crate::error::{Error, Result};
use crate::profile::SiteProfile;
use crate::scraper::Credentials;

/// Result of one login attempt. Created per attempt and consumed
/// immediately by the caller; never persisted.
#[derive(Debug)]
pub enum LoginOutcome {
	/// The dashboard marker appeared within the confirmation bound.
	Success,
	/// The sign-in service explicitly rejected the attempt, with the literal
	/// text it displayed. Retrying is pointless and may lock the account.
	CertainFailure {
		message: String,
		snapshot: Option<PathBuf>,
	},
	/// Confirmation timed out with no visible rejection. The session may in
	/// fact be valid; the retry decision belongs to the caller.
	AmbiguousFailure {
		waited: Duration,
		snapshot: Option<PathBuf>,
	},
}

impl LoginOutcome {
	pub fn is_certain_failure(&self) -> bool {
		matches!(self, LoginOutcome::CertainFailure { .. })
	}

	/// Converts the outcome into a strict result: only `Success` is `Ok`.
	pub fn into_result(self) -> Result<()> {
		match self {
			LoginOutcome::Success => Ok(()),
			LoginOutcome::CertainFailure { message, snapshot } => {
				Err(Error::LoginRejected { message, snapshot })
			}
			LoginOutcome::AmbiguousFailure { waited, snapshot } => Err(Error::LoginUnconfirmed {
				ms: waited.as_millis() as u64,
				snapshot,
			}),
		}
	}
}

pub(crate) struct LoginProtocol<'a> {
	driver: &'a dyn Driver,
	profile: &'a SiteProfile,
	credentials: &'a Credentials,
}

impl<'a> LoginProtocol<'a> {
	pub(crate) fn new(
		driver: &'a dyn Driver,
		profile: &'a SiteProfile,
		credentials: &'a Credentials,
	) -> Self {
		Self { driver, profile, credentials }
	}

	pub(crate) async fn run(&self) -> Result<LoginOutcome> {
		let profile = self.profile;
		info!(target = "dvc.auth", url = %profile.sign_in_url, "starting login");

		self.driver.navigate(&profile.sign_in_url).await?;
		self.driver.wait_for_settle(profile.settle_timeout).await?;
		debug!(target = "dvc.auth", "sign-in surface loaded");

		let frame = self.driver.enter_frame(&profile.auth_frame).await?;
		let scope = ViewScope::Frame(frame);
		debug!(target = "dvc.auth", frame = %profile.auth_frame, "located auth context");

		self.driver
			.fill(scope, &profile.email_field, &self.credentials.email)
			.await?;
		self.driver
			.fill(scope, &profile.password_field, &self.credentials.password)
			.await?;
		debug!(target = "dvc.auth", "entered credentials");

		// The submission triggers a navigation of the surrounding page; arm
		// the settle signal first so it cannot be missed.
		self.driver.arm_settle().await;
		self.driver.click(scope, &profile.submit_button).await?;
		self.driver.wait_for_settle(profile.settle_timeout).await?;
		debug!(target = "dvc.auth", "submitted sign-in form");

		match self
			.driver
			.poll_element(ViewScope::Top, &profile.dashboard_marker, profile.success_timeout)
			.await?
		{
			Probe::Found => {
				info!(target = "dvc.auth", "login confirmed");
				Ok(LoginOutcome::Success)
			}
			Probe::Absent => self.classify(scope).await,
		}
	}

	/// Runs only after the confirmation bound elapsed: capture a diagnostic
	/// snapshot, then look for an explicit rejection inside the auth frame.
	async fn classify(&self, scope: ViewScope) -> Result<LoginOutcome> {
		let snapshot = self.capture_snapshot().await;

		match self.driver.read_text(scope, &self.profile.error_banner).await {
			Ok(Some(message)) => {
				warn!(target = "dvc.auth", %message, "sign-in explicitly rejected");
				Ok(LoginOutcome::CertainFailure { message, snapshot })
			}
			Ok(None) => {
				warn!(
					target = "dvc.auth",
					waited_ms = self.profile.success_timeout.as_millis() as u64,
					"confirmation timed out with no rejection visible"
				);
				Ok(LoginOutcome::AmbiguousFailure {
					waited: self.profile.success_timeout,
					snapshot,
				})
			}
			Err(err) => {
				warn!(
					target = "dvc.auth",
					error = %err,
					"could not read the rejection banner"
				);
				Ok(LoginOutcome::AmbiguousFailure {
					waited: self.profile.success_timeout,
					snapshot,
				})
			}
		}
	}

	async fn capture_snapshot(&self) -> Option<PathBuf> {
		let name = format!("login-error-{}.png", Utc::now().format("%Y-%m-%dT%H-%M-%SZ"));
		let path = self.profile.snapshot_dir.join(name);
		match self.driver.screenshot(&path).await {
			Ok(()) => {
				info!(target = "dvc.auth", path = %path.display(), "captured diagnostic snapshot");
				Some(path)
			}
			Err(err) => {
				warn!(target = "dvc.auth", error = %err, "failed to capture diagnostic snapshot");
				None
			}
		}
	}
}
