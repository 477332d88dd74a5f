//! Request executor: performs one logical backend call with auth header injection, bounded
//! retries, and failure notifications.
//!
//! Every attempt is funneled through the relay's [`RequestQueue`], so the proactive quota
//! backoff applies to all outbound traffic. Recovery is handled locally for three cases:
//! a missing token (delayed retry while a login completes), a 401 (one silent
//! re-authentication per attempt), and a 429 (reactive Retry-After sleep). Each recovery
//! consumes one unit of the retry budget; when the budget runs out the call fails closed
//! with [`Error::RetriesExhausted`].

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenSource,
	http::{Body, HttpTransport, Method, OutboundRequest, RawResponse, UploadPart},
	limiter::{self, RateLimiter, RequestQueue, UnitWork},
	notify::{NoopNotificationSink, NotificationSink},
	obs::{self, CallKind, CallOutcome, RequestSpan},
};

/// Route prefixes reachable without a bearer token.
pub const UNAUTHENTICATED_PREFIXES: &[&str] = &[
	"/api/options/models",
	"/api/options/agents",
	"/api/options/security-analyzers",
	"/config.json",
	"/api/github/callback",
];

/// Returns `true` when the path requires a bearer token.
pub fn requires_auth(path: &str) -> bool {
	!UNAUTHENTICATED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Tunables governing retries and backoff; one value per relay instance, never ambient.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
	/// Retry budget per logical call; recoveries beyond it fail closed.
	pub max_retries: u32,
	/// Delay before re-checking for a token while a login is in flight.
	pub auth_wait: Duration,
	/// Reactive backoff applied to a 429 that carried no Retry-After header.
	pub default_retry_after: Duration,
	/// Base duration of the proactive quota backoff step function.
	pub base_backoff: Duration,
	/// Front-requeues granted to a unit that signals throttling to the queue.
	pub requeue_budget: u32,
}
impl RetryPolicy {
	/// Overrides the per-call retry budget.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the login-wait delay.
	pub fn with_auth_wait(mut self, auth_wait: Duration) -> Self {
		self.auth_wait = auth_wait;

		self
	}

	/// Overrides the fallback Retry-After duration.
	pub fn with_default_retry_after(mut self, default_retry_after: Duration) -> Self {
		self.default_retry_after = default_retry_after;

		self
	}

	/// Overrides the proactive backoff base.
	pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
		self.base_backoff = base_backoff;

		self
	}

	/// Overrides the queue-level requeue budget.
	pub fn with_requeue_budget(mut self, requeue_budget: u32) -> Self {
		self.requeue_budget = requeue_budget;

		self
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 3,
			auth_wait: Duration::milliseconds(500),
			default_retry_after: Duration::seconds(5),
			base_backoff: limiter::DEFAULT_BASE_BACKOFF,
			requeue_budget: limiter::DEFAULT_REQUEUE_BUDGET,
		}
	}
}

/// One logical backend call: target path, payload, and per-call policy flags.
#[derive(Clone, Debug)]
pub struct ApiCall {
	/// Request path relative to the base URL, query string included.
	pub path: String,
	/// HTTP method.
	pub method: Method,
	/// Optional request body.
	pub body: Option<Body>,
	/// Extra header name/value pairs supplied by the caller.
	pub headers: Vec<(String, String)>,
	/// Suppresses failure notifications for background/internal calls.
	pub suppress_notifications: bool,
	/// Overrides the relay-wide retry budget for this call.
	pub max_retries: Option<u32>,
}
impl ApiCall {
	/// Creates a call with the provided method and path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			method,
			body: None,
			headers: Vec::new(),
			suppress_notifications: false,
			max_retries: None,
		}
	}

	/// Creates a GET call.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Creates a POST call.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Attaches a JSON body.
	pub fn json(mut self, value: serde_json::Value) -> Self {
		self.body = Some(Body::Json(value));

		self
	}

	/// Attaches a multipart upload body.
	pub fn multipart(mut self, parts: Vec<UploadPart>) -> Self {
		self.body = Some(Body::Multipart(parts));

		self
	}

	/// Appends one request header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Silences failure notifications for this call.
	pub fn suppress_notifications(mut self) -> Self {
		self.suppress_notifications = true;

		self
	}

	/// Overrides the retry budget for this call.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = Some(max_retries);

		self
	}
}

/// Coordinates authenticated, throttled calls against a single backend.
///
/// The relay owns the transport, token source, notification sink, and request queue so the
/// endpoint catalog can focus on per-endpoint payloads and cache policy. Construction is
/// explicit; independent relays (e.g. in tests) own independent queues and quota state.
pub struct Relay<C>
where
	C: ?Sized + HttpTransport,
{
	/// HTTP transport used for every outbound attempt.
	pub transport: Arc<C>,
	/// Token collaborator read before each attempt.
	pub tokens: Arc<dyn TokenSource>,
	/// Notification sink for terminal failures.
	pub notifier: Arc<dyn NotificationSink>,
	/// Retry and backoff tunables.
	pub policy: RetryPolicy,
	queue: RequestQueue<RawResponse>,
	base_url: Url,
	auth_guard: AsyncMutex<()>,
}
impl<C> Relay<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a relay for the provided backend base URL, transport, and token source.
	pub fn new(base_url: Url, transport: impl Into<Arc<C>>, tokens: Arc<dyn TokenSource>) -> Self {
		let policy = RetryPolicy::default();

		Self {
			transport: transport.into(),
			tokens,
			notifier: Arc::new(NoopNotificationSink),
			queue: RequestQueue::new(policy.base_backoff, policy.requeue_budget),
			policy,
			base_url,
			auth_guard: AsyncMutex::new(()),
		}
	}

	/// Sets or replaces the notification sink.
	pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
		self.notifier = notifier;

		self
	}

	/// Replaces the retry policy, rebuilding the queue with the new backoff tunables.
	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.queue = RequestQueue::new(policy.base_backoff, policy.requeue_budget);
		self.policy = policy;

		self
	}

	/// Returns the backend base URL.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Returns the rate limiter shared by every call through this relay.
	pub fn rate_limiter(&self) -> &RateLimiter {
		self.queue.limiter()
	}

	/// Performs one logical call and returns the raw response without parsing the body.
	pub async fn dispatch(&self, call: ApiCall) -> Result<RawResponse> {
		let kind = CallKind::classify(&call.path);
		let span = RequestSpan::new(kind, "dispatch");

		obs::record_call_outcome(kind, CallOutcome::Attempt);

		let result = span.instrument(self.dispatch_inner(&call)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(kind, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(kind, CallOutcome::Failure),
		}

		result
	}

	/// Performs one logical call and deserializes the response body.
	pub async fn fetch_json<T>(&self, call: ApiCall) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let topic = call.path.clone();
		let suppress = call.suppress_notifications;
		let response = self.dispatch(call).await?;
		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			let err = Error::Payload { url: topic.clone(), source };

			if !suppress {
				self.notifier.error(&topic, &err.to_string());
			}

			err
		})
	}

	/// Performs one authentication check; returns `true` when the backend accepted it.
	///
	/// The call is a single bare enqueue with no 401 recovery, so it can never recurse into
	/// itself, and failures are swallowed into `false`.
	pub async fn authenticate(&self) -> bool {
		let Ok(url) = self.join("/api/authenticate") else { return false };
		let github = self.tokens.github_token();
		let mut headers = Vec::new();

		if let Some(token) = self.tokens.token() {
			headers.push(("authorization".into(), format!("Bearer {token}")));
		}
		if let Some(github) = &github {
			headers.push(("x-github-token".into(), github.clone()));
		}

		let request = OutboundRequest {
			url,
			method: Method::Post,
			headers,
			body: Some(Body::Json(serde_json::json!({ "github_token": github }))),
		};

		match self.enqueue_fetch(request).await {
			Ok(response) => response.is_success(),
			Err(_) => false,
		}
	}

	async fn dispatch_inner(&self, call: &ApiCall) -> Result<RawResponse> {
		let url = self.join(&call.path)?;
		let needs_auth = requires_auth(&call.path);
		let budget = call.max_retries.unwrap_or(self.policy.max_retries);
		let mut attempts_left = i64::from(budget);

		loop {
			if attempts_left < 0 {
				return Err(
					self.report(call, Error::RetriesExhausted { url: url.to_string(), budget })
				);
			}

			let token = self.tokens.token();

			if needs_auth && token.is_none() {
				limiter::sleep_for(self.policy.auth_wait).await;

				attempts_left -= 1;

				continue;
			}

			let request = self.outbound(&url, call, token.as_deref());
			let response = match self.enqueue_fetch(request).await {
				Ok(response) => response,
				Err(Error::Throttled { retry_after }) => {
					// The queue gave up front-requeuing this unit; fall back to the
					// reactive Retry-After path.
					limiter::sleep_for(retry_after.unwrap_or(self.policy.default_retry_after))
						.await;

					attempts_left -= 1;

					continue;
				},
				Err(err) => return Err(self.report(call, err)),
			};

			if let Some(update) = response.meta.rate_limit {
				self.queue.limiter().update(update);
			}

			match response.status {
				401 => {
					self.reauthenticate().await;

					attempts_left -= 1;
				},
				429 => {
					limiter::sleep_for(
						response.meta.retry_after.unwrap_or(self.policy.default_retry_after),
					)
					.await;

					attempts_left -= 1;
				},
				_ if !response.is_success() => {
					return Err(self.report(call, Error::Status {
						url: url.to_string(),
						status: response.status,
						status_text: response.status_text.clone(),
					}));
				},
				_ => return Ok(response),
			}
		}
	}

	async fn reauthenticate(&self) {
		// Serializes concurrent 401 recoveries so a burst of rejected calls does not
		// stampede the authenticate endpoint.
		let _guard = self.auth_guard.lock().await;
		let _ = self.authenticate().await;
	}

	async fn enqueue_fetch(&self, request: OutboundRequest) -> Result<RawResponse> {
		let transport = self.transport.clone();
		let work: UnitWork<RawResponse> = Box::new(move || {
			let transport = transport.clone();
			let request = request.clone();

			Box::pin(async move { transport.execute(request).await.map_err(Error::from) })
		});

		self.queue.enqueue(work).await
	}

	fn outbound(&self, url: &Url, call: &ApiCall, token: Option<&str>) -> OutboundRequest {
		let mut headers = call.headers.clone();

		if let Some(token) = token {
			headers.push(("authorization".into(), format!("Bearer {token}")));
		}
		if let Some(github) = self.tokens.github_token() {
			headers.push(("x-github-token".into(), github));
		}

		OutboundRequest { url: url.clone(), method: call.method, headers, body: call.body.clone() }
	}

	fn report(&self, call: &ApiCall, err: Error) -> Error {
		if !call.suppress_notifications {
			self.notifier.error(&call.path, &err.to_string());
		}

		err
	}

	fn join(&self, path: &str) -> Result<Url> {
		self.base_url.join(path).map_err(|source| Error::InvalidPath { path: path.into(), source })
	}
}
impl<C> Debug for Relay<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Relay")
			.field("base_url", &self.base_url.as_str())
			.field("policy", &self.policy)
			.field("queue", &self.queue)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn unauthenticated_prefixes_cover_the_public_routes() {
		assert!(!requires_auth("/api/options/models"));
		assert!(!requires_auth("/api/options/agents"));
		assert!(!requires_auth("/api/options/security-analyzers"));
		assert!(!requires_auth("/config.json"));
		assert!(!requires_auth("/api/github/callback?code=abc"));

		assert!(requires_auth("/api/list-files"));
		assert!(requires_auth("/api/save-file"));
		assert!(requires_auth("/api/authenticate"));
	}

	#[test]
	fn call_builders_compose() {
		let call = ApiCall::post("/api/save-file")
			.json(serde_json::json!({ "filePath": "/a/b.txt" }))
			.header("x-request-id", "42")
			.suppress_notifications()
			.with_max_retries(1);

		assert_eq!(call.method, Method::Post);
		assert!(call.suppress_notifications);
		assert_eq!(call.max_retries, Some(1));
		assert_eq!(call.headers.len(), 1);
		assert!(matches!(call.body, Some(Body::Json(_))));
	}

	#[test]
	fn default_policy_matches_documented_values() {
		let policy = RetryPolicy::default();

		assert_eq!(policy.max_retries, 3);
		assert_eq!(policy.auth_wait, Duration::milliseconds(500));
		assert_eq!(policy.default_retry_after, Duration::seconds(5));
		assert_eq!(policy.base_backoff, limiter::DEFAULT_BASE_BACKOFF);
	}
}
