//! Single-flight workbench API relay—one serial request queue with adaptive rate-limit backoff,
//! transparent re-authentication, and a typed endpoint catalog built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod cache;
pub mod error;
pub mod http;
pub mod limiter;
pub mod notify;
pub mod obs;
pub mod relay;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		api::ApiClient,
		auth::StaticTokenSource,
		cache::{MemoryCache, ResponseCache},
		http::ReqwestTransport,
		relay::{Relay, RetryPolicy},
	};

	/// Facade type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestTransport>;

	/// Retry policy with millisecond-scale delays so retry paths finish quickly under test.
	pub fn test_retry_policy() -> RetryPolicy {
		RetryPolicy::default()
			.with_auth_wait(Duration::milliseconds(10))
			.with_default_retry_after(Duration::milliseconds(20))
			.with_base_backoff(Duration::milliseconds(5))
	}

	/// Constructs an [`ApiClient`] backed by an in-memory cache, a static token source, and the
	/// reqwest transport used across integration tests.
	pub fn build_reqwest_test_client(
		base_url: &str,
	) -> (ReqwestTestClient, Arc<StaticTokenSource>, Arc<MemoryCache>) {
		let base_url = Url::parse(base_url).expect("Failed to parse test base URL.");
		let tokens = Arc::new(StaticTokenSource::default().with_token("test-token"));
		let cache_backend = Arc::new(MemoryCache::default());
		let cache: Arc<dyn ResponseCache> = cache_backend.clone();
		let relay = Relay::new(base_url, ReqwestTransport::default(), tokens.clone())
			.with_policy(test_retry_policy());

		(ApiClient::new(relay, cache), tokens, cache_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
