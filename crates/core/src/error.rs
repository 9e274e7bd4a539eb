//! Error taxonomy for the scraper.
//!
//! Structural errors (a selector that no longer matches, a missing auth
//! frame) surface immediately and are never retried here: the remote site's
//! structure changed, and retrying against it cannot succeed. Timeout-driven
//! outcomes are the only ones subject to classification and caller-level
//! retry policy.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Session storage exists but could not be read or written.
	#[error("failed to access session file {path}: {source}")]
	Storage {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Session storage exists but does not parse as a cookie set.
	#[error("session file {path} is corrupt: {source}")]
	CorruptSession {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	/// The browsing view itself is gone; not a timeout.
	#[error("browsing view unavailable: {0}")]
	ViewUnavailable(String),

	#[error("navigation to {url} failed: {message}")]
	Navigation { url: String, message: String },

	/// The nested authentication context could not be located.
	#[error("auth context `{selector}` not found on the login surface")]
	AuthContextNotFound { selector: String },

	/// An element required for form interaction could not be located.
	#[error("element `{selector}` not found in the current view")]
	FieldNotFound { selector: String },

	/// The sign-in service explicitly rejected the attempt. Carries the
	/// literal text presented by the remote login surface.
	#[error("login rejected by the sign-in service: '{message}'")]
	LoginRejected {
		message: String,
		snapshot: Option<PathBuf>,
	},

	/// Login confirmation timed out with no visible rejection. The session
	/// may still be valid; the retry decision belongs to the caller.
	#[error("login not confirmed within {ms}ms and no rejection was visible")]
	LoginUnconfirmed {
		ms: u64,
		snapshot: Option<PathBuf>,
	},

	#[error("failed to launch browser: {0}")]
	Launch(String),

	#[error("protocol error: {0}")]
	Protocol(String),

	#[error("connection closed before the response arrived")]
	ChannelClosed,

	#[error("timed out after {ms}ms waiting for {condition}")]
	Timeout { ms: u64, condition: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// True for a definitive authentication rejection. Calling workflows
	/// must abort on these; retrying may trigger an account lockout.
	pub fn is_certain_rejection(&self) -> bool {
		matches!(self, Error::LoginRejected { .. })
	}

	/// True for timeout-shaped failures a caller may reasonably retry.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Error::LoginUnconfirmed { .. } | Error::Timeout { .. }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejection_is_certain_and_not_retryable() {
		let err = Error::LoginRejected {
			message: "Incorrect email or password.".into(),
			snapshot: None,
		};
		assert!(err.is_certain_rejection());
		assert!(!err.is_retryable());
	}

	#[test]
	fn unconfirmed_login_is_retryable() {
		let err = Error::LoginUnconfirmed { ms: 15_000, snapshot: None };
		assert!(err.is_retryable());
		assert!(!err.is_certain_rejection());
	}

	#[test]
	fn rejection_message_carries_the_literal_banner_text() {
		let err = Error::LoginRejected {
			message: "Your account is locked".into(),
			snapshot: None,
		};
		assert!(err.to_string().contains("Your account is locked"));
	}
}
