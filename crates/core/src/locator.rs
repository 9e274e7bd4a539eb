//! Declarative element locations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A declarative description of where to find an element in a rendered view.
///
/// Locators are plain CSS selectors carried as values so the session layer's
/// control flow never hard-codes the markup of any one remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
	pub fn css(selector: impl Into<String>) -> Self {
		Self(selector.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Locator {
	fn from(selector: &str) -> Self {
		Self::css(selector)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn displays_the_raw_selector() {
		let locator = Locator::css(".workflow-login .btn-submit");
		assert_eq!(locator.to_string(), ".workflow-login .btn-submit");
		assert_eq!(locator.as_str(), ".workflow-login .btn-submit");
	}
}
