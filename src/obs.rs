//! Optional observability helpers for request dispatch.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `workbench_relay.call` with the `call`
//!   (endpoint group) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `workbench_relay_call_total` counter for every
//!   attempt/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Endpoint groups observed by the relay, classified from the request path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Model/agent/analyzer catalog listings.
	Options,
	/// Static server configuration document.
	Config,
	/// File listing, content, save, and upload endpoints.
	Files,
	/// Workspace archive download.
	Workspace,
	/// Feedback submission.
	Feedback,
	/// OAuth callback exchange.
	OAuth,
	/// Authentication checks.
	Auth,
	/// Rate-limit status queries.
	Quota,
	/// Anything the classifier does not recognize.
	Other,
}
impl CallKind {
	/// Classifies a request path into its endpoint group.
	pub fn classify(path: &str) -> Self {
		if path.starts_with("/api/options/") {
			Self::Options
		} else if path.starts_with("/config.json") {
			Self::Config
		} else if path.starts_with("/api/list-files")
			|| path.starts_with("/api/select-file")
			|| path.starts_with("/api/save-file")
			|| path.starts_with("/api/upload-files")
		{
			Self::Files
		} else if path.starts_with("/api/zip-directory") {
			Self::Workspace
		} else if path.starts_with("/api/submit-feedback") {
			Self::Feedback
		} else if path.starts_with("/api/github/") {
			Self::OAuth
		} else if path.starts_with("/api/authenticate") {
			Self::Auth
		} else if path.starts_with("/api/rate-limit") {
			Self::Quota
		} else {
			Self::Other
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::Options => "options",
			CallKind::Config => "config",
			CallKind::Files => "files",
			CallKind::Workspace => "workspace",
			CallKind::Feedback => "feedback",
			CallKind::OAuth => "oauth",
			CallKind::Auth => "auth",
			CallKind::Quota => "quota",
			CallKind::Other => "other",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to the executor.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn classification_covers_the_catalog() {
		assert_eq!(CallKind::classify("/api/options/models"), CallKind::Options);
		assert_eq!(CallKind::classify("/config.json"), CallKind::Config);
		assert_eq!(CallKind::classify("/api/list-files?path=src"), CallKind::Files);
		assert_eq!(CallKind::classify("/api/zip-directory"), CallKind::Workspace);
		assert_eq!(CallKind::classify("/api/github/callback?code=x"), CallKind::OAuth);
		assert_eq!(CallKind::classify("/api/authenticate"), CallKind::Auth);
		assert_eq!(CallKind::classify("/api/rate-limit"), CallKind::Quota);
		assert_eq!(CallKind::classify("/api/unknown"), CallKind::Other);
	}
}
