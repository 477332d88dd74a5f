//! Transport primitives for outbound backend calls.
//!
//! The module exposes [`HttpTransport`] alongside [`OutboundRequest`], [`RawResponse`], and
//! [`ResponseMetadata`] so downstream crates can integrate custom HTTP clients without losing
//! the relay's throttling hooks. Implementations parse the `retry-after` and `x-ratelimit-*`
//! response headers into [`ResponseMetadata`] before handing the response back, enabling the
//! executor to refresh quota state and honor backoff hints with consistent metadata.

// std
use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")]
use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing one backend call while surfacing the
/// response metadata the relay's throttling layers depend on.
///
/// The trait acts as the relay's only dependency on an HTTP stack. Callers provide an
/// implementation (typically behind `Arc<T>` where `T: HttpTransport`) and the executor clones
/// the request for every attempt, so implementations never observe retry bookkeeping.
/// Implementations must be `Send + Sync + 'static` so a single transport can back every unit
/// the queue executes, and the returned futures must be `Send` so the drain task can own them.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one HTTP call and captures status, metadata, and the full response body.
	///
	/// Implementations must resolve non-success statuses as ordinary [`RawResponse`] values;
	/// only connection-level failures map to [`TransportError`]. Status handling is executor
	/// policy, not transport policy.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, RawResponse>;
}

/// HTTP methods used by the endpoint catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// Idempotent read.
	Get,
	/// Mutation or submission.
	Post,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request body variants the catalog produces.
#[derive(Clone, Debug)]
pub enum Body {
	/// JSON document sent as `application/json`.
	Json(serde_json::Value),
	/// Multipart form upload composed of file parts.
	Multipart(Vec<UploadPart>),
}

/// One file part of a multipart upload.
#[derive(Clone, Debug)]
pub struct UploadPart {
	/// Form field name.
	pub name: String,
	/// File name reported to the backend, including its workspace-relative path.
	pub file_name: String,
	/// Raw file contents.
	pub bytes: Vec<u8>,
}

/// Fully-resolved outbound request, cloned by the executor for every attempt.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// Absolute request URL.
	pub url: Url,
	/// HTTP method.
	pub method: Method,
	/// Header name/value pairs, auth headers already merged.
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<Body>,
}

/// Captures throttling metadata from the most recent HTTP response.
///
/// Additional metadata fields may be added in future releases, so downstream code should
/// construct values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Quota advertisement parsed from `x-ratelimit-*` headers, when all were present.
	pub rate_limit: Option<RateLimitUpdate>,
}

/// Quota advertisement carried by `x-ratelimit-*` response headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitUpdate {
	/// Requests remaining in the current window.
	pub remaining: u64,
	/// Total ceiling for the window.
	pub limit: u64,
	/// Instant the window resets, when advertised.
	pub reset_at: Option<OffsetDateTime>,
}

/// Response captured by a transport: status line, throttling metadata, and the full body.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Canonical status text, empty when unknown.
	pub status_text: String,
	/// Throttling metadata parsed from response headers.
	pub meta: ResponseMetadata,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub const fn is_success(&self) -> bool {
		self.status >= 200 && self.status < 300
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// The relay merges auth headers per attempt and never follows cross-origin auth redirects,
/// so configure any custom [`ReqwestClient`] accordingly before wrapping it.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, RawResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}

			builder = match request.body {
				Some(Body::Json(value)) => builder
					.header("content-type", "application/json")
					.body(serde_json::to_vec(&value).map_err(TransportError::network)?),
				Some(Body::Multipart(parts)) => {
					let mut form = reqwest::multipart::Form::new();

					for part in parts {
						form = form.part(
							part.name,
							reqwest::multipart::Part::bytes(part.bytes)
								.file_name(part.file_name),
						);
					}

					builder.multipart(form)
				},
				None => builder,
			};

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let meta = ResponseMetadata {
				retry_after: parse_retry_after(&headers),
				rate_limit: parse_rate_limit(&headers),
			};
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(RawResponse {
				status: status.as_u16(),
				status_text: status.canonical_reason().unwrap_or_default().to_owned(),
				meta,
				body,
			})
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(feature = "reqwest")]
fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitUpdate> {
	let read_u64 = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<u64>().ok();
	let remaining = read_u64("x-ratelimit-remaining")?;
	let limit = read_u64("x-ratelimit-limit")?;
	let reset_at = read_u64("x-ratelimit-reset")
		.and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch as i64).ok());

	Some(RateLimitUpdate { remaining, limit, reset_at })
}
