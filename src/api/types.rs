//! Payload types exchanged with the backend catalog.

// self
use crate::_prelude::*;

/// Static server configuration document served at `/config.json`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ServerConfig {
	/// Deployment mode advertised by the backend.
	pub app_mode: Option<String>,
	/// Application slug, when deployed behind a multi-app gateway.
	pub app_slug: Option<String>,
	/// OAuth client identifier for the GitHub login flow.
	pub github_client_id: Option<String>,
	/// Analytics client key, when analytics are enabled.
	pub posthog_client_key: Option<String>,
	/// Forward-compatible bag for fields this client does not interpret.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Content of a single workspace file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
	/// Raw file text.
	pub code: String,
}

/// One file queued for upload, addressed by its workspace-relative path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
	/// Path relative to the workspace root, e.g. `dir1/f.txt`.
	pub relative_path: String,
	/// Raw file contents.
	pub bytes: Vec<u8>,
}
impl UploadFile {
	/// Creates an upload entry for the provided relative path.
	pub fn new(relative_path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
		Self { relative_path: relative_path.into(), bytes: bytes.into() }
	}
}

/// Backend summary of an upload request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
	/// Human-readable summary.
	#[serde(default)]
	pub message: String,
	/// Paths accepted by the backend.
	#[serde(default)]
	pub uploaded_files: Vec<String>,
	/// Files the backend refused, with reasons.
	#[serde(default)]
	pub skipped_files: Vec<SkippedFile>,
}

/// One file the backend refused to store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkippedFile {
	/// File name as submitted.
	pub name: String,
	/// Backend-supplied refusal reason.
	pub reason: String,
}

/// Sentiment attached to a feedback submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPolarity {
	/// The session went well.
	Positive,
	/// The session went poorly.
	Negative,
}

/// Visibility the user granted for a feedback submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackPermissions {
	/// May be shared publicly.
	Public,
	/// Restricted to the service operators.
	Private,
}

/// User feedback payload for `/api/submit-feedback`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
	/// Client version that produced the trajectory.
	pub version: String,
	/// Contact address supplied by the user.
	pub email: String,
	/// Session sentiment.
	pub polarity: FeedbackPolarity,
	/// Sharing permission granted by the user.
	pub permissions: FeedbackPermissions,
	/// Raw event trajectory being reported.
	pub trajectory: Vec<serde_json::Value>,
	/// Session token, when the user chose to attach it.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
}

/// Backend acknowledgement of a feedback submission.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResponse {
	/// Human-readable acknowledgement.
	#[serde(default)]
	pub message: String,
	/// Identifier assigned to the stored feedback, when created.
	#[serde(default)]
	pub feedback_id: Option<String>,
}

/// Token material returned by the OAuth callback exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokenResponse {
	/// Bearer token minted for the exchanged authorization code.
	pub access_token: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn server_config_tolerates_unknown_fields() {
		let config: ServerConfig = serde_json::from_str(
			r#"{ "APP_MODE": "oss", "GITHUB_CLIENT_ID": "abc", "FEATURE_FLAGS": { "x": true } }"#,
		)
		.expect("Config document should deserialize.");

		assert_eq!(config.app_mode.as_deref(), Some("oss"));
		assert_eq!(config.github_client_id.as_deref(), Some("abc"));
		assert!(config.extra.contains_key("FEATURE_FLAGS"));
	}

	#[test]
	fn feedback_serializes_with_lowercase_labels() {
		let feedback = Feedback {
			version: "1.0".into(),
			email: "dev@example.com".into(),
			polarity: FeedbackPolarity::Positive,
			permissions: FeedbackPermissions::Private,
			trajectory: Vec::new(),
			token: None,
		};
		let payload =
			serde_json::to_value(&feedback).expect("Feedback fixture should serialize.");

		assert_eq!(payload["polarity"], "positive");
		assert_eq!(payload["permissions"], "private");
		assert!(payload.get("token").is_none());
	}
}
