//! Local Chromium discovery, launch, and DevTools endpoint probing.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

const PROBE_ATTEMPTS: u32 = 40;
const PROBE_INTERVAL: Duration = Duration::from_millis(200);
const PROBE_HTTP_TIMEOUT: Duration = Duration::from_millis(400);

/// Options for launching the local browser process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Explicit browser binary; otherwise discovered from well-known names.
	pub binary: Option<PathBuf>,
	/// Fixed debugging port; otherwise an ephemeral port is picked.
	pub port: Option<u16>,
	pub headless: bool,
	pub window_size: (u32, u32),
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			binary: None,
			port: None,
			headless: true,
			window_size: (2560, 1400),
		}
	}
}

/// One entry of the `/json/list` target listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
	#[serde(rename = "type")]
	kind: String,
	#[serde(default)]
	web_socket_debugger_url: Option<String>,
}

/// A launched browser process plus the page endpoint it exposes.
pub(crate) struct BrowserProcess {
	child: Child,
	pub(crate) ws_url: String,
}

impl BrowserProcess {
	pub(crate) async fn launch(config: &EngineConfig) -> Result<Self> {
		let binary = match &config.binary {
			Some(path) => path.clone(),
			None => find_browser_executable().ok_or_else(|| {
				Error::Launch(
					"could not find a Chromium-based browser; install one or set the binary explicitly"
						.into(),
				)
			})?,
		};
		let port = match config.port {
			Some(port) => port,
			None => pick_free_port()?,
		};

		let mut args = vec![
			format!("--remote-debugging-port={port}"),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
			format!("--window-size={},{}", config.window_size.0, config.window_size.1),
		];
		if config.headless {
			args.push("--headless=new".to_string());
		}

		debug!(
			target = "dvc.engine",
			binary = %binary.display(),
			port,
			headless = config.headless,
			"launching browser"
		);

		let mut child = Command::new(&binary)
			.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.spawn()
			.map_err(|err| {
				Error::Launch(format!("failed to launch browser at {}: {err}", binary.display()))
			})?;

		let mut last_error = "endpoint not reachable".to_string();
		for _ in 0..PROBE_ATTEMPTS {
			tokio::time::sleep(PROBE_INTERVAL).await;

			if let Ok(Some(status)) = child.try_wait() {
				return Err(Error::Launch(format!(
					"browser exited before the debugging endpoint became available (status: {status})"
				)));
			}

			match fetch_page_endpoint(port).await {
				Ok(ws_url) => {
					debug!(target = "dvc.engine", %ws_url, "browser ready");
					return Ok(Self { child, ws_url });
				}
				Err(err) => last_error = err.to_string(),
			}
		}

		let _ = child.kill();
		Err(Error::Launch(format!(
			"debugging endpoint not available on port {port}: {last_error}"
		)))
	}

	/// Backstop teardown for when the graceful `Browser.close` did not take.
	pub(crate) fn shutdown(&mut self) {
		if matches!(self.child.try_wait(), Ok(None)) {
			if let Err(err) = self.child.kill() {
				warn!(target = "dvc.engine", error = %err, "failed to kill browser process");
			}
			let _ = self.child.wait();
		}
	}
}

impl Drop for BrowserProcess {
	fn drop(&mut self) {
		self.shutdown();
	}
}

fn pick_free_port() -> Result<u16> {
	let listener = TcpListener::bind(("127.0.0.1", 0))
		.map_err(|err| Error::Launch(format!("failed to reserve a debugging port: {err}")))?;
	let port = listener
		.local_addr()
		.map_err(|err| Error::Launch(format!("failed to read the reserved port: {err}")))?
		.port();
	Ok(port)
}

fn find_browser_executable() -> Option<PathBuf> {
	let candidates: &[&str] = if cfg!(target_os = "macos") {
		&[
			"/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
			"/Applications/Chromium.app/Contents/MacOS/Chromium",
			"/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
		]
	} else {
		&[
			"google-chrome-stable",
			"google-chrome",
			"chromium-browser",
			"chromium",
			"brave-browser",
			"/usr/bin/google-chrome-stable",
			"/usr/bin/google-chrome",
			"/usr/bin/chromium-browser",
			"/usr/bin/chromium",
			"/snap/bin/chromium",
		]
	};

	for candidate in candidates {
		if candidate.starts_with('/') {
			if std::path::Path::new(candidate).exists() {
				return Some(PathBuf::from(candidate));
			}
		} else if let Ok(resolved) = which::which(candidate) {
			return Some(resolved);
		}
	}

	None
}

/// Resolves the WebSocket endpoint of the first page target on `port`.
async fn fetch_page_endpoint(port: u16) -> Result<String> {
	let client = reqwest::Client::builder()
		.timeout(PROBE_HTTP_TIMEOUT)
		.build()
		.map_err(|err| Error::Launch(format!("failed to create probe client: {err}")))?;
	let mut last_error = "no response".to_string();

	for url in [
		format!("http://127.0.0.1:{port}/json/list"),
		format!("http://localhost:{port}/json/list"),
	] {
		let response = match client.get(&url).send().await {
			Ok(response) => response,
			Err(err) => {
				last_error = err.to_string();
				continue;
			}
		};

		if !response.status().is_success() {
			last_error = format!("unexpected status {}", response.status());
			continue;
		}

		let targets: Vec<TargetInfo> = response
			.json()
			.await
			.map_err(|err| Error::Launch(format!("failed to parse target list: {err}")))?;

		match first_page_endpoint(targets) {
			Some(ws_url) => return Ok(ws_url),
			None => last_error = "no page target exposed yet".to_string(),
		}
	}

	Err(Error::Launch(format!(
		"failed to reach the debugging endpoint on port {port}: {last_error}"
	)))
}

fn first_page_endpoint(targets: Vec<TargetInfo>) -> Option<String> {
	targets
		.into_iter()
		.filter(|target| target.kind == "page")
		.find_map(|target| target.web_socket_debugger_url)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn free_ports_are_nonzero() {
		assert_ne!(pick_free_port().unwrap(), 0);
	}

	#[test]
	fn target_listing_picks_the_first_page() {
		let raw = r#"[
			{"type": "iframe", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/F"},
			{"type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/A"},
			{"type": "page", "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/page/B"}
		]"#;
		let targets: Vec<TargetInfo> = serde_json::from_str(raw).unwrap();
		assert_eq!(
			first_page_endpoint(targets).as_deref(),
			Some("ws://127.0.0.1:9222/devtools/page/A")
		);
	}

	#[test]
	fn target_listing_without_pages_yields_nothing() {
		let raw = r#"[{"type": "background_page"}]"#;
		let targets: Vec<TargetInfo> = serde_json::from_str(raw).unwrap();
		assert_eq!(first_page_endpoint(targets), None);
	}
}
