//! DevTools-protocol implementation of the [`Driver`] contract.
//!
//! Element operations run as `Runtime.evaluate` calls, parameterized over
//! an execution context: the top-level document, or an isolated world
//! created inside an embedded frame for [`Driver::enter_frame`]. Settle
//! detection arms a subscription to `Page.loadEventFired` before the action
//! that triggers the load, so the event cannot slip past unobserved.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::debug;

use super::connection::{CdpConnection, Event};
use super::launcher::{BrowserProcess, EngineConfig};
use crate::cookies::CookieRecord;
use crate::driver::{Driver, FrameHandle, Probe, ViewScope, js_literal};
use crate::error::{Error, Result};
use crate::locator::Locator;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const LOAD_EVENT: &str = "Page.loadEventFired";
const ISOLATED_WORLD: &str = "dvcscraper";

/// [`Driver`] over a local Chromium's DevTools socket.
pub struct CdpDriver {
	conn: Arc<CdpConnection>,
	process: Mutex<Option<BrowserProcess>>,
	armed: Mutex<Option<broadcast::Receiver<Event>>>,
}

impl CdpDriver {
	/// Launches a local browser and attaches to its first page target.
	pub async fn launch(config: EngineConfig) -> Result<Self> {
		let process = BrowserProcess::launch(&config).await?;
		let ws_url = process.ws_url.clone();
		let driver = Self::attach(&ws_url, Some(process)).await?;
		Ok(driver)
	}

	/// Attaches to an already-running page WebSocket endpoint.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		Self::attach(ws_url, None).await
	}

	async fn attach(ws_url: &str, process: Option<BrowserProcess>) -> Result<Self> {
		let conn = CdpConnection::connect(ws_url).await?;
		let driver = Self {
			conn,
			process: Mutex::new(process),
			armed: Mutex::new(None),
		};
		driver.conn.send("Page.enable", json!({})).await?;
		driver.conn.send("Runtime.enable", json!({})).await?;
		Ok(driver)
	}

	async fn evaluate(
		&self,
		scope: ViewScope,
		expression: &str,
		await_promise: bool,
	) -> Result<Value> {
		let mut params = json!({
			"expression": expression,
			"returnByValue": true,
			"awaitPromise": await_promise,
		});
		if let ViewScope::Frame(frame) = scope {
			params["contextId"] = json!(frame.0);
		}

		let reply = self.conn.send("Runtime.evaluate", params).await?;
		if let Some(details) = reply.get("exceptionDetails") {
			let text = details
				.get("exception")
				.and_then(|exception| exception.get("description"))
				.and_then(Value::as_str)
				.unwrap_or("evaluation failed");
			return Err(Error::Protocol(format!("script threw: {text}")));
		}
		Ok(reply
			.get("result")
			.and_then(|result| result.get("value"))
			.cloned()
			.unwrap_or(Value::Null))
	}

	async fn element_exists(&self, scope: ViewScope, locator: &Locator) -> Result<bool> {
		let expression = format!(
			"document.querySelector({}) !== null",
			js_literal(locator.as_str())
		);
		Ok(self
			.evaluate(scope, &expression, false)
			.await?
			.as_bool()
			.unwrap_or(false))
	}

	async fn document_complete(&self) -> Result<bool> {
		Ok(self
			.evaluate(ViewScope::Top, "document.readyState === 'complete'", false)
			.await?
			.as_bool()
			.unwrap_or(false))
	}
}

#[async_trait]
impl Driver for CdpDriver {
	async fn navigate(&self, url: &str) -> Result<()> {
		self.arm_settle().await;
		let reply = self
			.conn
			.send("Page.navigate", json!({ "url": url }))
			.await
			.map_err(|err| Error::Navigation { url: url.to_string(), message: err.to_string() })?;

		if let Some(text) = reply.get("errorText").and_then(Value::as_str) {
			if !text.is_empty() {
				return Err(Error::Navigation {
					url: url.to_string(),
					message: text.to_string(),
				});
			}
		}
		Ok(())
	}

	async fn arm_settle(&self) {
		*self.armed.lock().await = Some(self.conn.subscribe());
	}

	async fn wait_for_settle(&self, timeout: Duration) -> Result<()> {
		let deadline = Instant::now() + timeout;
		let receiver = self.armed.lock().await.take();

		if let Some(mut events) = receiver {
			loop {
				match timeout_at(deadline, events.recv()).await {
					Ok(Ok(event)) if event.method == LOAD_EVENT => return Ok(()),
					Ok(Ok(_)) => continue,
					Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
					Ok(Err(broadcast::error::RecvError::Closed)) => break,
					Err(_) => break,
				}
			}
		}

		// The load event already fired, or nothing was armed: accept a
		// document that has finished loading.
		if self.document_complete().await? {
			return Ok(());
		}
		Err(Error::Timeout {
			ms: timeout.as_millis() as u64,
			condition: "navigation settle".to_string(),
		})
	}

	async fn poll_element(
		&self,
		scope: ViewScope,
		locator: &Locator,
		timeout: Duration,
	) -> Result<Probe> {
		let deadline = Instant::now() + timeout;
		loop {
			if self.element_exists(scope, locator).await? {
				return Ok(Probe::Found);
			}
			let now = Instant::now();
			if now >= deadline {
				return Ok(Probe::Absent);
			}
			sleep(POLL_INTERVAL.min(deadline - now)).await;
		}
	}

	async fn enter_frame(&self, locator: &Locator) -> Result<FrameHandle> {
		let document = self.conn.send("DOM.getDocument", json!({ "depth": 0 })).await?;
		let root = document["root"]["nodeId"]
			.as_i64()
			.ok_or_else(|| Error::Protocol("document without a root node".into()))?;

		let found = self
			.conn
			.send(
				"DOM.querySelector",
				json!({ "nodeId": root, "selector": locator.as_str() }),
			)
			.await?;
		let node = found.get("nodeId").and_then(Value::as_i64).unwrap_or(0);
		if node == 0 {
			return Err(Error::AuthContextNotFound { selector: locator.to_string() });
		}

		let described = self.conn.send("DOM.describeNode", json!({ "nodeId": node })).await?;
		let frame_id = described["node"]["frameId"]
			.as_str()
			.ok_or_else(|| Error::AuthContextNotFound { selector: locator.to_string() })?
			.to_string();

		let world = self
			.conn
			.send(
				"Page.createIsolatedWorld",
				json!({ "frameId": frame_id, "worldName": ISOLATED_WORLD }),
			)
			.await?;
		let context = world
			.get("executionContextId")
			.and_then(Value::as_u64)
			.ok_or_else(|| Error::Protocol("isolated world without an execution context".into()))?;

		debug!(target = "dvc.engine", frame = %locator, context, "entered frame");
		Ok(FrameHandle(context))
	}

	async fn fill(&self, scope: ViewScope, locator: &Locator, text: &str) -> Result<()> {
		let expression = format!(
			"(() => {{ const el = document.querySelector({selector}); if (!el) return false; \
			 el.focus(); el.value = {value}; \
			 el.dispatchEvent(new Event('input', {{bubbles: true}})); \
			 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
			selector = js_literal(locator.as_str()),
			value = js_literal(text),
		);
		match self.evaluate(scope, &expression, false).await?.as_bool() {
			Some(true) => Ok(()),
			_ => Err(Error::FieldNotFound { selector: locator.to_string() }),
		}
	}

	async fn click(&self, scope: ViewScope, locator: &Locator) -> Result<()> {
		let expression = format!(
			"(() => {{ const el = document.querySelector({selector}); if (!el) return false; \
			 el.click(); return true; }})()",
			selector = js_literal(locator.as_str()),
		);
		match self.evaluate(scope, &expression, false).await?.as_bool() {
			Some(true) => Ok(()),
			_ => Err(Error::FieldNotFound { selector: locator.to_string() }),
		}
	}

	async fn read_text(&self, scope: ViewScope, locator: &Locator) -> Result<Option<String>> {
		let expression = format!(
			"(() => {{ const el = document.querySelector({selector}); \
			 return el ? el.innerText : null; }})()",
			selector = js_literal(locator.as_str()),
		);
		Ok(self
			.evaluate(scope, &expression, false)
			.await?
			.as_str()
			.map(str::to_string))
	}

	async fn eval_json(&self, scope: ViewScope, expression: &str) -> Result<Value> {
		self.evaluate(scope, expression, true).await
	}

	async fn screenshot(&self, path: &Path) -> Result<()> {
		let reply = self
			.conn
			.send(
				"Page.captureScreenshot",
				json!({ "format": "png", "captureBeyondViewport": true }),
			)
			.await?;
		let data = reply
			.get("data")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Protocol("screenshot without payload".into()))?;
		let bytes = BASE64
			.decode(data)
			.map_err(|err| Error::Protocol(format!("invalid screenshot payload: {err}")))?;

		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() && !parent.exists() {
				std::fs::create_dir_all(parent)?;
			}
		}
		std::fs::write(path, bytes)?;
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<CookieRecord>> {
		let reply = self.conn.send("Storage.getCookies", json!({})).await?;
		let cookies = reply
			.get("cookies")
			.cloned()
			.unwrap_or_else(|| Value::Array(Vec::new()));
		Ok(serde_json::from_value(cookies)?)
	}

	async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
		if cookies.is_empty() {
			return Ok(());
		}
		let params: Vec<Value> = cookies.iter().map(cookie_param).collect();
		self.conn
			.send("Storage.setCookies", json!({ "cookies": params }))
			.await
			.map(|_| ())
	}

	async fn close(&self) -> Result<()> {
		if let Err(err) = self.conn.send("Browser.close", json!({})).await {
			debug!(target = "dvc.engine", error = %err, "graceful close failed");
		}
		if let Some(mut process) = self.process.lock().await.take() {
			process.shutdown();
		}
		Ok(())
	}
}

/// Builds the `Storage.setCookies` parameter for one record. Session
/// cookies omit `expires` entirely.
fn cookie_param(cookie: &CookieRecord) -> Value {
	let mut param = json!({
		"name": cookie.name,
		"value": cookie.value,
		"domain": cookie.domain,
		"path": cookie.path,
		"httpOnly": cookie.http_only,
		"secure": cookie.secure,
	});
	if cookie.expires >= 0.0 {
		param["expires"] = json!(cookie.expires);
	}
	if let Some(same_site) = cookie.same_site {
		param["sameSite"] = json!(same_site);
	}
	param
}

#[cfg(test)]
mod tests {
	use crate::cookies::SameSite;

	use super::*;

	#[test]
	fn session_cookies_omit_expiry() {
		let cookie = CookieRecord::new("session", "token", ".go.com");
		let param = cookie_param(&cookie);
		assert!(param.get("expires").is_none());
		assert_eq!(param["name"], "session");
		assert_eq!(param["path"], "/");
	}

	#[test]
	fn persistent_cookies_carry_expiry_and_flags() {
		let cookie = CookieRecord {
			expires: 1_893_456_000.0,
			http_only: true,
			secure: true,
			same_site: Some(SameSite::Strict),
			..CookieRecord::new("SWID", "{ABC}", ".go.com")
		};
		let param = cookie_param(&cookie);
		assert_eq!(param["expires"], 1_893_456_000.0);
		assert_eq!(param["sameSite"], "Strict");
		assert_eq!(param["httpOnly"], true);
	}
}
