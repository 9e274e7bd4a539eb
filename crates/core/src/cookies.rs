//! Cookie records and durable session storage.
//!
//! The session file is the sole persisted artifact: a flat JSON array of
//! cookie records, overwritten whole at shutdown. The record shape matches
//! the DevTools cookie objects on the wire, so restoring a session is a
//! straight deserialization.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Cookie `SameSite` policy as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	Lax,
	None,
}

/// One persisted browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
	pub name: String,
	pub value: String,
	pub domain: String,
	#[serde(default = "default_cookie_path")]
	pub path: String,
	/// Seconds since the Unix epoch; negative for session cookies.
	#[serde(default = "default_cookie_expiry")]
	pub expires: f64,
	#[serde(default)]
	pub http_only: bool,
	#[serde(default)]
	pub secure: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub same_site: Option<SameSite>,
}

impl CookieRecord {
	/// A session cookie for `domain` with default path and flags.
	pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			value: value.into(),
			domain: domain.into(),
			path: default_cookie_path(),
			expires: default_cookie_expiry(),
			http_only: false,
			secure: false,
			same_site: None,
		}
	}
}

fn default_cookie_path() -> String {
	"/".to_string()
}

fn default_cookie_expiry() -> f64 {
	-1.0
}

/// Durable storage for the session cookie set.
#[derive(Debug, Clone)]
pub struct SessionStore {
	path: PathBuf,
}

impl SessionStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Loads the persisted cookie set.
	///
	/// A missing file is an empty session, not an error: the first run has
	/// nothing to restore. Malformed content and inaccessible storage are
	/// distinct failures so callers can tell "re-authenticate" apart from
	/// "fix the filesystem".
	pub fn load(&self) -> Result<Vec<CookieRecord>> {
		let raw = match fs::read_to_string(&self.path) {
			Ok(raw) => raw,
			Err(err) if err.kind() == io::ErrorKind::NotFound => {
				debug!(
					target = "dvc.session",
					path = %self.path.display(),
					"no session file; starting with an empty session"
				);
				return Ok(Vec::new());
			}
			Err(err) => {
				return Err(Error::Storage { path: self.path.clone(), source: err });
			}
		};

		serde_json::from_str(&raw)
			.map_err(|err| Error::CorruptSession { path: self.path.clone(), source: err })
	}

	/// Overwrites the stored cookie set with `cookies`.
	pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() && !parent.exists() {
				fs::create_dir_all(parent)
					.map_err(|err| Error::Storage { path: self.path.clone(), source: err })?;
			}
		}

		let json = serde_json::to_string_pretty(cookies)?;
		fs::write(&self.path, json)
			.map_err(|err| Error::Storage { path: self.path.clone(), source: err })?;
		debug!(
			target = "dvc.session",
			path = %self.path.display(),
			count = cookies.len(),
			"session persisted"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	fn sample_cookies() -> Vec<CookieRecord> {
		vec![
			CookieRecord {
				expires: 1_893_456_000.0,
				http_only: true,
				secure: true,
				same_site: Some(SameSite::Lax),
				..CookieRecord::new("SWID", "{ABC-123}", ".go.com")
			},
			CookieRecord::new("session", "token", "disneyvacationclub.disney.go.com"),
		]
	}

	#[test]
	fn missing_file_is_an_empty_session() {
		let temp = TempDir::new().unwrap();
		let store = SessionStore::new(temp.path().join("absent.json"));
		assert_eq!(store.load().unwrap(), Vec::new());
	}

	#[test]
	fn save_then_load_round_trips_unordered() {
		let temp = TempDir::new().unwrap();
		let store = SessionStore::new(temp.path().join("session.json"));
		let mut cookies = sample_cookies();
		store.save(&cookies).unwrap();

		let mut loaded = store.load().unwrap();
		cookies.sort_by(|a, b| a.name.cmp(&b.name));
		loaded.sort_by(|a, b| a.name.cmp(&b.name));
		assert_eq!(loaded, cookies);
	}

	#[test]
	fn corrupt_file_is_a_distinct_error() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("session.json");
		fs::write(&path, "{ not cookies").unwrap();

		let err = SessionStore::new(&path).load().unwrap_err();
		assert!(matches!(err, Error::CorruptSession { .. }), "got {err:?}");
	}

	#[test]
	fn unreadable_storage_is_an_access_error() {
		let temp = TempDir::new().unwrap();
		// The store path is a directory, so the read fails with something
		// other than NotFound.
		let err = SessionStore::new(temp.path()).load().unwrap_err();
		assert!(matches!(err, Error::Storage { .. }), "got {err:?}");
	}

	#[test]
	fn save_creates_missing_parent_directories() {
		let temp = TempDir::new().unwrap();
		let store = SessionStore::new(temp.path().join("nested/dir/session.json"));
		store.save(&sample_cookies()).unwrap();
		assert_eq!(store.load().unwrap().len(), 2);
	}

	#[test]
	fn records_accept_wire_shape_with_unknown_fields() {
		let raw = r#"[{
			"name": "SWID",
			"value": "{ABC}",
			"domain": ".go.com",
			"path": "/",
			"expires": -1,
			"httpOnly": true,
			"secure": true,
			"session": true,
			"sameSite": "None",
			"priority": "Medium"
		}]"#;
		let cookies: Vec<CookieRecord> = serde_json::from_str(raw).unwrap();
		assert_eq!(cookies[0].same_site, Some(SameSite::None));
		assert!(cookies[0].http_only);
		assert_eq!(cookies[0].expires, -1.0);
	}
}
