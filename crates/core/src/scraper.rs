//! The scraper facade: one driver, one session, authenticated navigation.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cookies::SessionStore;
use crate::driver::{Driver, Probe, ViewScope};
use crate::engine::{CdpDriver, EngineConfig};
use crate::error::{Error, Result};
use crate::gate::AuthGate;
use crate::locator::Locator;
use crate::login::{LoginOutcome, LoginProtocol};
use crate::profile::SiteProfile;
use crate::session::{AuthState, Session};

/// Sign-in credentials. Treated as precondition inputs to the login
/// protocol and never persisted; the password is redacted from `Debug`.
#[derive(Clone)]
pub struct Credentials {
	pub email: String,
	pub password: String,
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Everything needed to stand a scraper up against a live browser.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
	pub profile: SiteProfile,
	pub credentials: Credentials,
	/// Where the session cookie set is persisted across runs.
	pub session_file: PathBuf,
	pub engine: EngineConfig,
}

/// Authenticated access to the member site.
///
/// A scraper owns exactly one browsing context and one [`Session`]. The
/// session is loaded from storage at construction, mutated only by the
/// login protocol, and persisted at [`close`](Scraper::close).
pub struct Scraper {
	driver: Box<dyn Driver>,
	profile: SiteProfile,
	credentials: Credentials,
	store: SessionStore,
	session: Session,
}

impl Scraper {
	/// Launches a local browser and builds a scraper over it.
	pub async fn launch(config: ScraperConfig) -> Result<Self> {
		let driver = CdpDriver::launch(config.engine).await?;
		Self::with_driver(
			Box::new(driver),
			config.profile,
			config.credentials,
			SessionStore::new(config.session_file),
		)
		.await
	}

	/// Builds a scraper over an existing driver, restoring any persisted
	/// session into the browsing context.
	pub async fn with_driver(
		driver: Box<dyn Driver>,
		profile: SiteProfile,
		credentials: Credentials,
		store: SessionStore,
	) -> Result<Self> {
		let cookies = store.load()?;
		if !cookies.is_empty() {
			driver.set_cookies(&cookies).await?;
			debug!(
				target = "dvc.session",
				count = cookies.len(),
				"restored persisted session"
			);
		}
		let session = Session::from_cookies(cookies);
		Ok(Self { driver, profile, credentials, store, session })
	}

	pub fn session(&self) -> &Session {
		&self.session
	}

	pub fn profile(&self) -> &SiteProfile {
		&self.profile
	}

	pub(crate) fn driver(&self) -> &dyn Driver {
		self.driver.as_ref()
	}

	/// Arrives at `target` authenticated.
	///
	/// Navigates, lets the page settle, and checks for the sign-in surface.
	/// If the session has lapsed the login protocol runs; on success or on
	/// an ambiguous outcome the original target is re-navigated, because the
	/// login flow lands on a generic dashboard rather than the requested
	/// location. A certain rejection propagates immediately.
	pub async fn authenticated_navigate(
		&mut self,
		target: &str,
		ready_marker: &Locator,
	) -> Result<()> {
		info!(target = "dvc.nav", url = %target, "authenticated navigate");
		self.driver.navigate(target).await?;
		self.driver.wait_for_settle(self.profile.settle_timeout).await?;

		let gate = AuthGate::new(self.profile.sign_in_marker.clone(), self.profile.gate_timeout);
		if !gate.is_unauthenticated(self.driver.as_ref()).await? {
			self.session.set_state(AuthState::Authenticated);
			debug!(target = "dvc.nav", url = %target, "session already authenticated");
			return Ok(());
		}
		self.session.set_state(AuthState::Unauthenticated);

		match self.login().await? {
			LoginOutcome::Success => {}
			LoginOutcome::CertainFailure { message, snapshot } => {
				return Err(Error::LoginRejected { message, snapshot });
			}
			LoginOutcome::AmbiguousFailure { waited, .. } => {
				// The session may in fact be valid; proceed speculatively and
				// let the caller's own markers decide.
				warn!(
					target = "dvc.nav",
					waited_ms = waited.as_millis() as u64,
					"login unconfirmed; re-navigating anyway"
				);
			}
		}

		self.driver.navigate(target).await?;
		self.driver.wait_for_settle(self.profile.settle_timeout).await?;

		if let Ok(Probe::Absent) = self
			.driver
			.poll_element(ViewScope::Top, ready_marker, self.profile.gate_timeout)
			.await
		{
			warn!(
				target = "dvc.nav",
				marker = %ready_marker,
				"ready marker not visible after re-navigation"
			);
		}
		Ok(())
	}

	/// Runs the login protocol once and records the resulting state.
	pub async fn login(&mut self) -> Result<LoginOutcome> {
		let outcome = LoginProtocol::new(self.driver.as_ref(), &self.profile, &self.credentials)
			.run()
			.await?;
		match &outcome {
			LoginOutcome::Success => self.session.set_state(AuthState::Authenticated),
			LoginOutcome::CertainFailure { .. } => {
				self.session.set_state(AuthState::Unauthenticated);
			}
			LoginOutcome::AmbiguousFailure { .. } => self.session.set_state(AuthState::Unknown),
		}
		Ok(outcome)
	}

	/// Captures a full-page screenshot of the current view.
	pub async fn screenshot(&self, path: &Path) -> Result<()> {
		self.driver.screenshot(path).await
	}

	/// Persists the session and tears the browsing context down.
	///
	/// A failed save only degrades the next run to a fresh login, so it is
	/// logged and swallowed; engine teardown errors still propagate.
	pub async fn close(mut self) -> Result<()> {
		match self.driver.cookies().await {
			Ok(cookies) => {
				self.session.replace_cookies(cookies);
				if let Err(err) = self.store.save(self.session.cookies()) {
					warn!(target = "dvc.session", error = %err, "failed to persist session");
				}
			}
			Err(err) => {
				warn!(target = "dvc.session", error = %err, "failed to read cookies at shutdown");
			}
		}
		self.driver.close().await
	}
}
