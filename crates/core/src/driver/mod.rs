//! The rendering-engine contract.
//!
//! The session layer never touches an engine API directly: everything it
//! needs from the rendered view goes through [`Driver`], with each element
//! operation parameterized over the [`ViewScope`] it targets. The embedded
//! sign-in frame is a [`FrameHandle`] obtained through
//! [`Driver::enter_frame`], never an assumption about the top-level view.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cookies::CookieRecord;
use crate::error::Result;
use crate::locator::Locator;

pub mod scripted;

/// Handle to a nested document context resolved via [`Driver::enter_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(pub(crate) u64);

/// Which document context an element operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewScope {
	#[default]
	Top,
	Frame(FrameHandle),
}

/// Outcome of a bounded element poll.
///
/// A broken view propagates as `Err` instead of being folded in here, so
/// login classification stays a total function of this value plus the
/// banner lookup that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
	Found,
	/// The bound elapsed without the element appearing.
	Absent,
}

/// Capabilities the session layer requires from a rendering engine.
#[async_trait]
pub trait Driver: Send + Sync {
	/// Directs the browsing context to `url` and arms the settle signal.
	async fn navigate(&self, url: &str) -> Result<()>;

	/// Arms the navigation-settle signal ahead of an action that is about
	/// to trigger a page load (e.g. a form submission).
	async fn arm_settle(&self);

	/// Waits for the armed settle signal, bounded by `timeout`.
	async fn wait_for_settle(&self, timeout: Duration) -> Result<()>;

	/// Polls for an element up to `timeout`.
	async fn poll_element(
		&self,
		scope: ViewScope,
		locator: &Locator,
		timeout: Duration,
	) -> Result<Probe>;

	/// Resolves a nested document context (an embedded frame).
	async fn enter_frame(&self, locator: &Locator) -> Result<FrameHandle>;

	/// Replaces the value of an input element.
	async fn fill(&self, scope: ViewScope, locator: &Locator, text: &str) -> Result<()>;

	async fn click(&self, scope: ViewScope, locator: &Locator) -> Result<()>;

	/// Reads the rendered text of an element; `None` when it cannot be
	/// located.
	async fn read_text(&self, scope: ViewScope, locator: &Locator) -> Result<Option<String>>;

	/// Evaluates a JavaScript expression and returns its JSON value,
	/// awaiting promises.
	async fn eval_json(&self, scope: ViewScope, expression: &str) -> Result<Value>;

	/// Captures a full-page screenshot to `path`.
	async fn screenshot(&self, path: &Path) -> Result<()>;

	async fn cookies(&self) -> Result<Vec<CookieRecord>>;

	async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()>;

	/// Tears the engine down. Further calls are errors.
	async fn close(&self) -> Result<()>;
}

/// Renders `text` as a JavaScript string literal.
///
/// Selectors and user input are spliced into evaluated scripts through this
/// so quoting in either can never break out of the expression.
pub(crate) fn js_literal(text: &str) -> String {
	Value::String(text.to_string()).to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn js_literal_escapes_quotes_and_backslashes() {
		assert_eq!(js_literal(r#"a"b\c"#), r#""a\"b\\c""#);
		assert_eq!(js_literal("plain"), "\"plain\"");
	}
}
