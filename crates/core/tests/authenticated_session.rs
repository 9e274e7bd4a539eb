//! End-to-end behavior of the authenticated-session layer against a
//! scripted driver: session restore, gate decisions, login classification,
//! and the re-navigation rules.

use std::time::Duration;

use tempfile::TempDir;

use dvcscraper::driver::scripted::ScriptedDriver;
use dvcscraper::{
	AuthState, CookieRecord, Credentials, Error, Locator, Scraper, SessionStore, SiteProfile,
};

fn credentials() -> Credentials {
	Credentials {
		email: "member@example.com".into(),
		password: "hunter2".into(),
	}
}

fn profile(temp: &TempDir) -> SiteProfile {
	SiteProfile {
		snapshot_dir: temp.path().to_path_buf(),
		..SiteProfile::default()
	}
}

/// Scripts the full sign-in surface: marker, auth frame, credential fields,
/// and the submit button.
fn script_sign_in_surface(driver: &ScriptedDriver, profile: &SiteProfile) {
	driver.add_element(&profile.sign_in_marker);
	driver.add_frame(&profile.auth_frame);
	driver.add_element(&profile.email_field);
	driver.add_element(&profile.password_field);
	driver.add_element(&profile.submit_button);
}

async fn scraper_with(
	driver: &ScriptedDriver,
	profile: &SiteProfile,
	store: SessionStore,
) -> Scraper {
	Scraper::with_driver(Box::new(driver.clone()), profile.clone(), credentials(), store)
		.await
		.expect("scraper should construct")
}

// Scenario: empty session store, valid credentials, confirmation marker
// appears at 3s (inside the 15s bound).
#[tokio::test(start_paused = true)]
async fn fresh_session_logs_in_once_and_lands_on_the_target() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	script_sign_in_surface(&driver, &profile);
	driver.add_element_after(&profile.dashboard_marker, Duration::from_secs(3));

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let home = profile.home_url.clone();
	scraper
		.authenticated_navigate(&home, &profile.dashboard_marker)
		.await
		.expect("navigation should succeed");

	assert_eq!(scraper.session().state(), AuthState::Authenticated);
	// Exactly one login execution.
	assert_eq!(driver.click_count(&profile.submit_button), 1);
	// Target, sign-in surface, then back to the target.
	assert_eq!(
		driver.navigations(),
		vec![home.clone(), profile.sign_in_url.clone(), home]
	);
}

// Scenario: a still-valid persisted session. The gate reports authenticated
// on the first check; login never runs.
#[tokio::test(start_paused = true)]
async fn valid_persisted_session_skips_login_entirely() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	// No sign-in marker anywhere: the view is an authenticated dashboard.
	driver.add_element(&profile.dashboard_marker);

	let cookies = vec![
		CookieRecord::new("SWID", "{ABC-123}", ".go.com"),
		CookieRecord::new("session", "token", "disneyvacationclub.disney.go.com"),
	];
	let store = SessionStore::new(temp.path().join("session.json"));
	store.save(&cookies).unwrap();

	let mut scraper = scraper_with(&driver, &profile, store).await;
	// The persisted cookies were injected into the browsing context.
	assert_eq!(driver.cookie_jar(), cookies);

	let home = profile.home_url.clone();
	scraper
		.authenticated_navigate(&home, &profile.dashboard_marker)
		.await
		.expect("navigation should succeed");

	assert_eq!(scraper.session().state(), AuthState::Authenticated);
	// Zero login side effects: one navigation, nothing filled, nothing clicked.
	assert_eq!(driver.navigations(), vec![home]);
	assert!(driver.fills().is_empty());
	assert!(driver.clicks().is_empty());
}

// Scenario: invalid credentials, banner visible at the bound. The exact
// banner text propagates and the workflow aborts without re-navigating.
#[tokio::test(start_paused = true)]
async fn explicit_rejection_aborts_without_renavigation() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	script_sign_in_surface(&driver, &profile);
	driver.add_text_element(&profile.error_banner, "Incorrect email or password.");

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let home = profile.home_url.clone();
	let err = scraper
		.authenticated_navigate(&home, &profile.dashboard_marker)
		.await
		.expect_err("rejected credentials should fail the navigation");

	match &err {
		Error::LoginRejected { message, snapshot } => {
			assert_eq!(message, "Incorrect email or password.");
			assert!(snapshot.is_some());
		}
		other => panic!("expected a login rejection, got {other:?}"),
	}
	assert!(err.is_certain_rejection());

	// No re-navigation after a certain failure.
	assert_eq!(
		driver.navigations(),
		vec![home, profile.sign_in_url.clone()]
	);
	assert_eq!(driver.screenshots().len(), 1);
	assert_eq!(scraper.session().state(), AuthState::Unauthenticated);
}

// Scenario: confirmation never appears and no banner is visible (slow but
// possibly successful load). The controller proceeds speculatively.
#[tokio::test(start_paused = true)]
async fn ambiguous_outcome_renavigates_and_succeeds() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	script_sign_in_surface(&driver, &profile);

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let home = profile.home_url.clone();
	scraper
		.authenticated_navigate(&home, &profile.dashboard_marker)
		.await
		.expect("ambiguous outcomes should not fail the navigation");

	assert_eq!(
		driver.navigations(),
		vec![home.clone(), profile.sign_in_url.clone(), home]
	);
	assert_eq!(scraper.session().state(), AuthState::Unknown);
	assert_eq!(driver.screenshots().len(), 1);
}

// A structurally broken login surface (no auth frame) fails fast instead of
// being classified.
#[tokio::test(start_paused = true)]
async fn missing_auth_context_is_fatal() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	driver.add_element(&profile.sign_in_marker);

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let home = profile.home_url.clone();
	let err = scraper
		.authenticated_navigate(&home, &profile.dashboard_marker)
		.await
		.expect_err("a missing auth frame should be fatal");
	assert!(matches!(err, Error::AuthContextNotFound { .. }), "got {err:?}");
	assert!(driver.screenshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn close_persists_the_browsing_context_cookies() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	driver.set_cookie_jar(vec![CookieRecord::new("SWID", "{FRESH}", ".go.com")]);

	let path = temp.path().join("session.json");
	let scraper = scraper_with(&driver, &profile, SessionStore::new(&path)).await;
	scraper.close().await.expect("close should succeed");

	assert!(driver.is_closed());
	let saved = SessionStore::new(&path).load().unwrap();
	assert_eq!(saved, vec![CookieRecord::new("SWID", "{FRESH}", ".go.com")]);
}

// Direct login runs leave the outcome decision to the caller.
#[tokio::test(start_paused = true)]
async fn direct_login_reports_the_classified_outcome() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	script_sign_in_surface(&driver, &profile);
	driver.add_text_element(&profile.error_banner, "Your account has been locked.");

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let outcome = scraper.login().await.expect("the protocol itself should complete");
	assert!(outcome.is_certain_failure());
	assert_eq!(scraper.session().state(), AuthState::Unauthenticated);

	let err = outcome.into_result().unwrap_err();
	assert!(err.to_string().contains("Your account has been locked."));
}

// The ready-marker poll after re-navigation is best-effort: its absence is
// logged, never fatal.
#[tokio::test(start_paused = true)]
async fn missing_ready_marker_after_login_is_not_fatal() {
	let temp = TempDir::new().unwrap();
	let profile = profile(&temp);
	let driver = ScriptedDriver::new();
	script_sign_in_surface(&driver, &profile);
	driver.add_element_after(&profile.dashboard_marker, Duration::from_secs(2));

	let store = SessionStore::new(temp.path().join("session.json"));
	let mut scraper = scraper_with(&driver, &profile, store).await;

	let target = profile.add_on_url.clone();
	// The ready marker for this target never appears.
	scraper
		.authenticated_navigate(&target, &Locator::css(".resort-tile"))
		.await
		.expect("absent ready markers should only warn");
}
