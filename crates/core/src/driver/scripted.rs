//! Scripted in-memory driver for exercising the session layer without a
//! browser.
//!
//! Tests configure which elements exist (optionally appearing only after a
//! delay) and inspect the recorded traffic afterwards. The driver is
//! cheaply cloneable; clones share one script state, so a test can hand a
//! clone to a [`Scraper`](crate::Scraper) and keep the original for
//! assertions. Delays are measured on the tokio clock, so tests run under
//! `start_paused` without waiting in real time.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::{Instant, sleep};

use crate::cookies::CookieRecord;
use crate::driver::{Driver, FrameHandle, Probe, ViewScope};
use crate::error::{Error, Result};
use crate::locator::Locator;

const TICK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
struct ScriptedElement {
	text: Option<String>,
	appears_after: Duration,
}

#[derive(Debug, Default)]
struct ScriptState {
	elements: HashMap<String, ScriptedElement>,
	frames: HashMap<String, u64>,
	next_frame: u64,
	cookies: Vec<CookieRecord>,
	eval_results: VecDeque<Value>,
	navigations: Vec<String>,
	fills: Vec<(String, String)>,
	clicks: Vec<String>,
	screenshots: Vec<PathBuf>,
	fail_navigation_to: Option<String>,
	view_broken: bool,
	closed: bool,
}

/// In-memory [`Driver`] with scripted element behavior.
#[derive(Clone)]
pub struct ScriptedDriver {
	epoch: Instant,
	state: Arc<Mutex<ScriptState>>,
}

impl ScriptedDriver {
	pub fn new() -> Self {
		Self {
			epoch: Instant::now(),
			state: Arc::new(Mutex::new(ScriptState::default())),
		}
	}

	/// Registers an element that is visible immediately.
	pub fn add_element(&self, locator: &Locator) {
		self.add_element_after(locator, Duration::ZERO);
	}

	/// Registers an element that only becomes visible `delay` after the
	/// driver was created.
	pub fn add_element_after(&self, locator: &Locator, delay: Duration) {
		self.state.lock().elements.insert(
			locator.as_str().to_string(),
			ScriptedElement { text: None, appears_after: delay },
		);
	}

	/// Registers an immediately visible element with rendered text.
	pub fn add_text_element(&self, locator: &Locator, text: &str) {
		self.state.lock().elements.insert(
			locator.as_str().to_string(),
			ScriptedElement { text: Some(text.to_string()), appears_after: Duration::ZERO },
		);
	}

	pub fn remove_element(&self, locator: &Locator) {
		self.state.lock().elements.remove(locator.as_str());
	}

	/// Registers a frame resolvable via `enter_frame`.
	pub fn add_frame(&self, locator: &Locator) {
		let mut state = self.state.lock();
		state.next_frame += 1;
		let handle = state.next_frame;
		state.frames.insert(locator.as_str().to_string(), handle);
	}

	pub fn set_cookie_jar(&self, cookies: Vec<CookieRecord>) {
		self.state.lock().cookies = cookies;
	}

	/// Queues a value to be returned by the next `eval_json` call.
	pub fn push_eval_result(&self, value: Value) {
		self.state.lock().eval_results.push_back(value);
	}

	/// Makes every view operation fail, simulating a dead browsing context.
	pub fn break_view(&self) {
		self.state.lock().view_broken = true;
	}

	/// Makes navigation to exactly `url` fail.
	pub fn fail_navigation_to(&self, url: &str) {
		self.state.lock().fail_navigation_to = Some(url.to_string());
	}

	pub fn navigations(&self) -> Vec<String> {
		self.state.lock().navigations.clone()
	}

	pub fn fills(&self) -> Vec<(String, String)> {
		self.state.lock().fills.clone()
	}

	pub fn clicks(&self) -> Vec<String> {
		self.state.lock().clicks.clone()
	}

	pub fn click_count(&self, locator: &Locator) -> usize {
		self.state
			.lock()
			.clicks
			.iter()
			.filter(|selector| selector.as_str() == locator.as_str())
			.count()
	}

	pub fn screenshots(&self) -> Vec<PathBuf> {
		self.state.lock().screenshots.clone()
	}

	pub fn cookie_jar(&self) -> Vec<CookieRecord> {
		self.state.lock().cookies.clone()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	fn visible(&self, selector: &str) -> Result<bool> {
		let state = self.state.lock();
		if state.view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		Ok(state
			.elements
			.get(selector)
			.is_some_and(|element| self.epoch.elapsed() >= element.appears_after))
	}
}

impl Default for ScriptedDriver {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl Driver for ScriptedDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		let mut state = self.state.lock();
		if state.view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		state.navigations.push(url.to_string());
		if state.fail_navigation_to.as_deref() == Some(url) {
			return Err(Error::Navigation {
				url: url.to_string(),
				message: "scripted navigation failure".into(),
			});
		}
		Ok(())
	}

	async fn arm_settle(&self) {}

	async fn wait_for_settle(&self, _timeout: Duration) -> Result<()> {
		if self.state.lock().view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		Ok(())
	}

	async fn poll_element(
		&self,
		_scope: ViewScope,
		locator: &Locator,
		timeout: Duration,
	) -> Result<Probe> {
		let deadline = Instant::now() + timeout;
		loop {
			if self.visible(locator.as_str())? {
				return Ok(Probe::Found);
			}
			let now = Instant::now();
			if now >= deadline {
				return Ok(Probe::Absent);
			}
			sleep(TICK.min(deadline - now)).await;
		}
	}

	async fn enter_frame(&self, locator: &Locator) -> Result<FrameHandle> {
		let state = self.state.lock();
		if state.view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		state
			.frames
			.get(locator.as_str())
			.map(|handle| FrameHandle(*handle))
			.ok_or_else(|| Error::AuthContextNotFound { selector: locator.to_string() })
	}

	async fn fill(&self, _scope: ViewScope, locator: &Locator, text: &str) -> Result<()> {
		if !self.visible(locator.as_str())? {
			return Err(Error::FieldNotFound { selector: locator.to_string() });
		}
		self.state
			.lock()
			.fills
			.push((locator.as_str().to_string(), text.to_string()));
		Ok(())
	}

	async fn click(&self, _scope: ViewScope, locator: &Locator) -> Result<()> {
		if !self.visible(locator.as_str())? {
			return Err(Error::FieldNotFound { selector: locator.to_string() });
		}
		self.state.lock().clicks.push(locator.as_str().to_string());
		Ok(())
	}

	async fn read_text(&self, _scope: ViewScope, locator: &Locator) -> Result<Option<String>> {
		if !self.visible(locator.as_str())? {
			return Ok(None);
		}
		Ok(self
			.state
			.lock()
			.elements
			.get(locator.as_str())
			.and_then(|element| element.text.clone()))
	}

	async fn eval_json(&self, _scope: ViewScope, _expression: &str) -> Result<Value> {
		let mut state = self.state.lock();
		if state.view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		Ok(state.eval_results.pop_front().unwrap_or(Value::Null))
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		let mut state = self.state.lock();
		if state.view_broken {
			return Err(Error::ViewUnavailable("scripted view is broken".into()));
		}
		state.screenshots.push(path.to_path_buf());
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<CookieRecord>> {
		Ok(self.state.lock().cookies.clone())
	}

	async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
		self.state.lock().cookies = cookies.to_vec();
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.state.lock().closed = true;
		Ok(())
	}
}
