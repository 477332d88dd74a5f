#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::Duration;
use url::Url;
// self
use workbench_relay::{
	api::{ApiClient, Feedback, FeedbackPermissions, FeedbackPolarity, UploadFile},
	auth::StaticTokenSource,
	cache::{CacheKey, MemoryCache, ResponseCache},
	http::ReqwestTransport,
	relay::{Relay, RetryPolicy},
};

fn build_client(
	server: &MockServer,
) -> (ApiClient<ReqwestTransport>, Arc<StaticTokenSource>, Arc<MemoryCache>) {
	let base_url =
		Url::parse(&server.base_url()).expect("Mock server base URL should parse successfully.");
	let tokens = Arc::new(StaticTokenSource::default().with_token("test-token"));
	let cache = Arc::new(MemoryCache::default());
	let policy = RetryPolicy::default()
		.with_auth_wait(Duration::milliseconds(10))
		.with_default_retry_after(Duration::milliseconds(20))
		.with_base_backoff(Duration::ZERO);
	let relay =
		Relay::new(base_url, ReqwestTransport::default(), tokens.clone()).with_policy(policy);

	(ApiClient::new(relay, cache.clone()), tokens, cache)
}

#[tokio::test]
async fn catalog_reads_are_memoized() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/options/models");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!(["gpt-4o", "claude-sonnet"]));
		})
		.await;
	let first = client.get_models().await.expect("First model listing should succeed.");
	let second = client.get_models().await.expect("Cached model listing should succeed.");

	assert_eq!(first, ["gpt-4o", "claude-sonnet"]);
	assert_eq!(first, second);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn config_document_is_typed_and_memoized() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/config.json");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "APP_MODE": "oss", "GITHUB_CLIENT_ID": "abc123" }));
		})
		.await;
	let config = client.get_config().await.expect("Config fetch should succeed.");
	let _cached = client.get_config().await.expect("Cached config fetch should succeed.");

	assert_eq!(config.app_mode.as_deref(), Some("oss"));
	assert_eq!(config.github_client_id.as_deref(), Some("abc123"));

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn save_file_invalidates_the_stale_entries() {
	let server = MockServer::start_async().await;
	let (client, _tokens, cache) = build_client(&server);
	let file_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/select-file").query_param("file", "/a/b.txt");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "code": "fn main() {}" }));
		})
		.await;
	let dir_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/list-files").query_param("path", "/a");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!(["b.txt"]));
		})
		.await;
	let save_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/save-file");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "message": "saved" }));
		})
		.await;

	// Prime each cacheable read twice; each should hit the backend once. The root listing is
	// seeded directly so its deletion can be observed on the cache handle.
	for _ in 0..2 {
		client.get_file("/a/b.txt").await.expect("File read should succeed.");
		client.get_files(Some("/a")).await.expect("Directory listing should succeed.");
	}

	cache
		.set(&CacheKey::listing(None), json!(["a"]))
		.await
		.expect("Seeding the root listing should succeed.");
	file_mock.assert_calls_async(1).await;
	dir_mock.assert_calls_async(1).await;

	client.save_file("/a/b.txt", "fn main() { run() }").await.expect("Save should succeed.");
	save_mock.assert_calls_async(1).await;

	// The write staled the file, its directory listing, and the root listing.
	assert!(!cache.contains(&CacheKey::file("/a/b.txt")));
	assert!(!cache.contains(&CacheKey::listing(Some("/a"))));
	assert!(!cache.contains(&CacheKey::listing(None)));

	client.get_file("/a/b.txt").await.expect("File re-read should succeed.");
	client.get_files(Some("/a")).await.expect("Directory re-listing should succeed.");

	file_mock.assert_calls_async(2).await;
	dir_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn upload_invalidates_root_and_parent_listings() {
	let server = MockServer::start_async().await;
	let (client, _tokens, cache) = build_client(&server);
	let dir_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/list-files").query_param("path", "dir1");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!([]));
		})
		.await;
	let upload_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/upload-files");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"message": "uploaded",
				"uploaded_files": ["dir1/f.txt"],
				"skipped_files": [],
			}));
		})
		.await;

	client.get_files(Some("dir1")).await.expect("Directory listing should succeed.");
	cache
		.set(&CacheKey::listing(None), json!(["dir1"]))
		.await
		.expect("Seeding the root listing should succeed.");

	let outcome = client
		.upload_files(vec![UploadFile::new("dir1/f.txt", b"content".to_vec())])
		.await
		.expect("Upload should succeed.");

	assert_eq!(outcome.uploaded_files, ["dir1/f.txt"]);

	upload_mock.assert_calls_async(1).await;

	assert!(!cache.contains(&CacheKey::listing(None)));
	assert!(!cache.contains(&CacheKey::listing(Some("dir1"))));

	client.get_files(Some("dir1")).await.expect("Directory re-listing should succeed.");

	dir_mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn workspace_archive_is_raw_and_never_cached() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let archive = [0x50u8, 0x4b, 0x03, 0x04, 0xff];
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/zip-directory");
			then.status(200).header("content-type", "application/zip").body(archive);
		})
		.await;
	let first = client.get_workspace_zip().await.expect("Archive download should succeed.");
	let second = client.get_workspace_zip().await.expect("Second download should succeed.");

	assert_eq!(first, archive);
	assert_eq!(second, archive);

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn feedback_and_oauth_exchange_round_trip() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let feedback_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/submit-feedback");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "message": "Thanks!", "feedback_id": "fb-1" }));
		})
		.await;
	let oauth_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/github/callback").query_param("code", "abc");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "access_token": "gho_xyz" }));
		})
		.await;
	let feedback = Feedback {
		version: "1.0".into(),
		email: "dev@example.com".into(),
		polarity: FeedbackPolarity::Positive,
		permissions: FeedbackPermissions::Private,
		trajectory: vec![json!({ "action": "run" })],
		token: None,
	};
	let ack =
		client.submit_feedback(&feedback).await.expect("Feedback submission should succeed.");
	let exchanged =
		client.exchange_oauth_code("abc").await.expect("OAuth exchange should succeed.");

	assert_eq!(ack.feedback_id.as_deref(), Some("fb-1"));
	assert_eq!(exchanged.access_token, "gho_xyz");

	feedback_mock.assert_calls_async(1).await;
	oauth_mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rate_limit_status_reads_quota_headers() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/rate-limit");
			then.status(200)
				.header("x-ratelimit-remaining", "7")
				.header("x-ratelimit-limit", "10")
				.header("x-ratelimit-reset", "1754600000")
				.json_body(json!({}));
		})
		.await;
	let info = client.get_rate_limit_status().await;

	assert_eq!(info.requests_remaining, Some(7));
	assert_eq!(info.total_limit, Some(10));
	assert!(info.reset_at.is_some());

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn rate_limit_status_swallows_failures() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/rate-limit");
			then.status(500).json_body(json!({}));
		})
		.await;
	// The failed check surfaces nothing; callers receive the last known snapshot.
	let info = client.get_rate_limit_status().await;

	assert_eq!(info.requests_remaining, None);
	assert_eq!(info.total_limit, None);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn authenticate_reports_backend_acceptance() {
	let server = MockServer::start_async().await;
	let (client, _tokens, _cache) = build_client(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/authenticate");
			then.status(200).json_body(json!({}));
		})
		.await;

	assert!(client.authenticate().await);

	mock.assert_calls_async(1).await;
}
