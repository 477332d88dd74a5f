//! Cache contracts and the built-in in-memory backend for idempotent responses.
//!
//! Entries have no TTL in this layer; staleness is handled purely by explicit invalidation
//! from the mutation endpoints in [`crate::api`].

// self
use crate::_prelude::*;

/// Boxed future returned by [`ResponseCache`] operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + 'a + Send>>;

/// Key-value contract implemented by response cache backends.
pub trait ResponseCache
where
	Self: Send + Sync,
{
	/// Fetches the cached payload for the key, if present.
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<serde_json::Value>>;

	/// Persists or replaces the payload for the key.
	fn set<'a>(&'a self, key: &'a CacheKey, value: serde_json::Value) -> CacheFuture<'a, ()>;

	/// Removes the payload for the key, if present.
	fn delete<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, ()>;
}

/// Error type produced by [`ResponseCache`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CacheError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Structured cache key, one variant per memoized resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
	/// Model catalog listing.
	Models,
	/// Agent catalog listing.
	Agents,
	/// Security analyzer catalog listing.
	SecurityAnalyzers,
	/// Static server configuration document.
	Config,
	/// Directory listing; `None` addresses the workspace root.
	Listing(Option<String>),
	/// Single file content, keyed by workspace path.
	File(String),
}
impl CacheKey {
	/// Builds a listing key, normalizing the empty path to the root listing.
	pub fn listing(path: Option<&str>) -> Self {
		match path {
			None | Some("") => Self::Listing(None),
			Some(path) => Self::Listing(Some(path.into())),
		}
	}

	/// Builds a file-content key.
	pub fn file(path: impl Into<String>) -> Self {
		Self::File(path.into())
	}

	/// Builds the listing key for the directory containing `path`.
	///
	/// `/a/b.txt` maps to the `/a` listing; a bare file name maps to the root listing.
	pub fn parent_listing(path: &str) -> Self {
		match path.rfind('/') {
			Some(idx) if idx > 0 => Self::Listing(Some(path[..idx].into())),
			_ => Self::Listing(None),
		}
	}

	/// Renders the stable storage key for this entry.
	pub fn as_key(&self) -> String {
		match self {
			Self::Models => "models".into(),
			Self::Agents => "agents".into(),
			Self::SecurityAnalyzers => "security-analyzers".into(),
			Self::Config => "config".into(),
			Self::Listing(path) => format!("files:{}", path.as_deref().unwrap_or("root")),
			Self::File(path) => format!("file:{path}"),
		}
	}
}
impl Display for CacheKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.as_key())
	}
}

type CacheMap = Arc<RwLock<HashMap<String, serde_json::Value>>>;

/// Thread-safe cache backend that keeps entries in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache(CacheMap);
impl MemoryCache {
	/// Returns the number of live entries; used by invalidation tests.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Returns `true` when the key currently has an entry.
	pub fn contains(&self, key: &CacheKey) -> bool {
		self.0.read().contains_key(&key.as_key())
	}
}
impl ResponseCache for MemoryCache {
	fn get<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, Option<serde_json::Value>> {
		let map = self.0.clone();
		let key = key.as_key();

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a CacheKey, value: serde_json::Value) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.as_key();

		Box::pin(async move {
			map.write().insert(key, value);

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a CacheKey) -> CacheFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.as_key();

		Box::pin(async move {
			map.write().remove(&key);

			Ok(())
		})
	}
}
