//! Auth token collaborators consumed by the request executor.

// self
use crate::_prelude::*;

/// Supplies the current bearer token and the secondary GitHub token.
///
/// The relay never mints or refreshes credentials itself; it reads whatever the surrounding
/// application currently holds, immediately before each attempt, so an in-flight login is
/// picked up by the executor's delayed retry without extra coordination.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns the current primary bearer token, if one exists.
	fn token(&self) -> Option<String>;

	/// Returns the current GitHub provider token, if one exists.
	fn github_token(&self) -> Option<String>;
}

/// Thread-safe token source that keeps credentials in-process for tests and demos.
#[derive(Debug, Default)]
pub struct StaticTokenSource {
	token: Mutex<Option<String>>,
	github_token: Mutex<Option<String>>,
}
impl StaticTokenSource {
	/// Sets the primary bearer token.
	pub fn with_token(self, token: impl Into<String>) -> Self {
		*self.token.lock() = Some(token.into());

		self
	}

	/// Sets the GitHub provider token.
	pub fn with_github_token(self, token: impl Into<String>) -> Self {
		*self.github_token.lock() = Some(token.into());

		self
	}

	/// Replaces the primary bearer token at runtime.
	pub fn set_token(&self, token: impl Into<String>) {
		*self.token.lock() = Some(token.into());
	}

	/// Clears the primary bearer token, reverting the source to the logged-out state.
	pub fn clear_token(&self) {
		*self.token.lock() = None;
	}

	/// Replaces the GitHub provider token at runtime.
	pub fn set_github_token(&self, token: impl Into<String>) {
		*self.github_token.lock() = Some(token.into());
	}
}
impl TokenSource for StaticTokenSource {
	fn token(&self) -> Option<String> {
		self.token.lock().clone()
	}

	fn github_token(&self) -> Option<String> {
		self.github_token.lock().clone()
	}
}
