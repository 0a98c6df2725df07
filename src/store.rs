//! Storage contracts and built-in store implementations for cached token records.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::RedisTokenStore;

// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, TokenRecord},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for token records, reachable from every process instance.
///
/// No compare-and-swap is offered: writers that could race are serialized externally by the
/// refresh lock, so [`save`](Self::save) is plain last-write-wins. Reads may be momentarily
/// stale; the coordinator's double-check after acquiring the lock absorbs that.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the record for the key, if present.
	fn fetch<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Persists or replaces the record for the key.
	fn save<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		record: TokenRecord,
	) -> StoreFuture<'a, ()>;

	/// Removes the record for the key (revocation/logout path). Removing an absent key is not
	/// an error.
	fn remove<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Record (de)serialization failure surfaced by the backend.
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
