//! Relay-level error types shared across the queue, executor, and endpoint catalog.

// self
use crate::_prelude::*;

/// Relay-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical relay error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Cache-layer failure.
	#[error("{0}")]
	Cache(
		#[from]
		#[source]
		crate::cache::CacheError,
	),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Backend answered with a status the executor does not recover from locally.
	#[error("Backend returned {status} {status_text} for `{url}`.")]
	Status {
		/// Full request URL.
		url: String,
		/// HTTP status code.
		status: u16,
		/// Canonical status text, when known.
		status_text: String,
	},
	/// Distinguished throttle signal (HTTP 429 equivalent) understood by the request queue.
	#[error("Backend throttled the request.")]
	Throttled {
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Response body could not be decoded into the expected payload.
	#[error("Response payload for `{url}` is malformed.")]
	Payload {
		/// Request URL or cache key the payload belongs to.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Retry budget exhausted; the call chain must fail closed.
	#[error("Retry budget of {budget} exhausted for `{url}`.")]
	RetriesExhausted {
		/// Full request URL.
		url: String,
		/// Retry budget the call started with.
		budget: u32,
	},
	/// Request path cannot be joined onto the configured base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The queue's drain task terminated before settling the unit.
	#[error("Request queue shut down before the call settled.")]
	QueueShutdown,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
