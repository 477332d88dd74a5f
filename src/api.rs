//! Typed endpoint catalog layered on the request executor, one caching policy per endpoint.
//!
//! Pure reads are memoized under deterministic [`CacheKey`]s with no TTL; mutation endpoints
//! delete exactly the entries they can stale (the target file, its containing directory
//! listing, and the root listing). Binary and fire-and-forget endpoints bypass the cache.

pub mod types;

pub use types::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	cache::{CacheKey, ResponseCache},
	http::{HttpTransport, UploadPart},
	limiter::RateLimitInfo,
	relay::{ApiCall, Relay},
};

/// Typed API facade consumed by UI collaborators.
pub struct ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	relay: Relay<C>,
	cache: Arc<dyn ResponseCache>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a facade over the provided relay and cache backend.
	pub fn new(relay: Relay<C>, cache: Arc<dyn ResponseCache>) -> Self {
		Self { relay, cache }
	}

	/// Returns the underlying relay, e.g. to subscribe to rate-limit updates.
	pub fn relay(&self) -> &Relay<C> {
		&self.relay
	}

	/// Lists the models the backend can run.
	pub async fn get_models(&self) -> Result<Vec<String>> {
		self.cached_read(CacheKey::Models, ApiCall::get("/api/options/models")).await
	}

	/// Lists the available agent implementations.
	pub async fn get_agents(&self) -> Result<Vec<String>> {
		self.cached_read(CacheKey::Agents, ApiCall::get("/api/options/agents")).await
	}

	/// Lists the available security analyzers.
	pub async fn get_security_analyzers(&self) -> Result<Vec<String>> {
		self.cached_read(
			CacheKey::SecurityAnalyzers,
			ApiCall::get("/api/options/security-analyzers"),
		)
		.await
	}

	/// Fetches the static server configuration document.
	pub async fn get_config(&self) -> Result<ServerConfig> {
		self.cached_read(CacheKey::Config, ApiCall::get("/config.json")).await
	}

	/// Lists workspace entries under `path`; `None` lists the workspace root.
	pub async fn get_files(&self, path: Option<&str>) -> Result<Vec<String>> {
		let call = match path {
			Some(path) if !path.is_empty() =>
				ApiCall::get(format!("/api/list-files?{}", encoded_query("path", path))),
			_ => ApiCall::get("/api/list-files"),
		};

		self.cached_read(CacheKey::listing(path), call).await
	}

	/// Fetches the content of a single workspace file.
	pub async fn get_file(&self, path: &str) -> Result<FileContent> {
		let call = ApiCall::get(format!("/api/select-file?{}", encoded_query("file", path)));

		self.cached_read(CacheKey::file(path), call).await
	}

	/// Writes `content` to the workspace file at `path`, invalidating the entries the write
	/// can stale: the file itself, its containing directory listing, and the root listing.
	pub async fn save_file(&self, path: &str, content: &str) -> Result<()> {
		let call = ApiCall::post("/api/save-file")
			.json(serde_json::json!({ "filePath": path, "content": content }));

		self.relay.dispatch(call).await?;
		self.invalidate_file(path).await
	}

	/// Uploads files into the workspace, invalidating the root listing plus, per uploaded
	/// file, its content entry and its parent directory listing.
	pub async fn upload_files(&self, files: Vec<UploadFile>) -> Result<UploadOutcome> {
		let parts = files
			.iter()
			.map(|file| UploadPart {
				name: "files".into(),
				file_name: file.relative_path.clone(),
				bytes: file.bytes.clone(),
			})
			.collect();
		let outcome =
			self.relay.fetch_json(ApiCall::post("/api/upload-files").multipart(parts)).await?;

		self.cache.delete(&CacheKey::listing(None)).await?;

		for file in &files {
			self.cache.delete(&CacheKey::file(&file.relative_path)).await?;
			self.cache.delete(&CacheKey::parent_listing(&file.relative_path)).await?;
		}

		Ok(outcome)
	}

	/// Downloads the workspace archive as raw bytes; never cached.
	pub async fn get_workspace_zip(&self) -> Result<Vec<u8>> {
		let response = self.relay.dispatch(ApiCall::get("/api/zip-directory")).await?;

		Ok(response.body)
	}

	/// Submits user feedback; fire-and-forget, never cached.
	pub async fn submit_feedback(&self, feedback: &Feedback) -> Result<FeedbackResponse> {
		let payload = serde_path_to_error::serialize(feedback, serde_json::value::Serializer)
			.map_err(|source| Error::Payload { url: "/api/submit-feedback".into(), source })?;

		self.relay.fetch_json(ApiCall::post("/api/submit-feedback").json(payload)).await
	}

	/// Exchanges an OAuth authorization code via the GitHub callback endpoint.
	pub async fn exchange_oauth_code(&self, code: &str) -> Result<OAuthTokenResponse> {
		let call = ApiCall::get(format!("/api/github/callback?{}", encoded_query("code", code)));

		self.relay.fetch_json(call).await
	}

	/// Performs an authentication check; returns `true` when the backend accepted it.
	pub async fn authenticate(&self) -> bool {
		self.relay.authenticate().await
	}

	/// Queries the backend for fresh quota headers and returns the resulting snapshot.
	///
	/// Request failures are swallowed; the last advertisement the limiter already holds is
	/// returned instead of propagating the failure.
	pub async fn get_rate_limit_status(&self) -> RateLimitInfo {
		let _ = self.relay.dispatch(ApiCall::get("/api/rate-limit").suppress_notifications()).await;

		self.relay.rate_limiter().snapshot()
	}

	async fn cached_read<T>(&self, key: CacheKey, call: ApiCall) -> Result<T>
	where
		T: DeserializeOwned,
	{
		if let Some(value) = self.cache.get(&key).await? {
			return decode(&key, value);
		}

		let value = self.relay.fetch_json::<serde_json::Value>(call).await?;

		self.cache.set(&key, value.clone()).await?;

		decode(&key, value)
	}

	async fn invalidate_file(&self, path: &str) -> Result<()> {
		self.cache.delete(&CacheKey::file(path)).await?;
		self.cache.delete(&CacheKey::listing(None)).await?;
		self.cache.delete(&CacheKey::parent_listing(path)).await?;

		Ok(())
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient").field("relay", &self.relay).finish()
	}
}

fn decode<T>(key: &CacheKey, value: serde_json::Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| Error::Payload { url: key.to_string(), source })
}

fn encoded_query(key: &str, value: &str) -> String {
	url::form_urlencoded::Serializer::new(String::new()).append_pair(key, value).finish()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn query_values_are_percent_encoded() {
		assert_eq!(encoded_query("path", "dir with spaces"), "path=dir+with+spaces");
		assert_eq!(encoded_query("file", "/a/b.txt"), "file=%2Fa%2Fb.txt");
	}
}
