//! Redis-backed [`TokenStore`] shared by every process instance in the fleet.

// crates.io
use fred::{clients::Pool, interfaces::KeysInterface};
// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, TokenRecord},
	store::{StoreError, StoreFuture, TokenStore},
};

/// Networked store persisting JSON-serialized records under
/// `{namespace}:{principal}:{registration}`.
///
/// Values carry no TTL; record eviction is the store operator's policy, not this client's.
#[derive(Clone)]
pub struct RedisTokenStore {
	pool: Pool,
	namespace: String,
}
impl RedisTokenStore {
	/// Creates a store client on an established connection pool under the provided key
	/// namespace.
	pub fn new(pool: Pool, namespace: impl Into<String>) -> Self {
		Self { pool, namespace: namespace.into() }
	}

	fn encode(record: &TokenRecord) -> Result<String, StoreError> {
		serde_json::to_string(record)
			.map_err(|err| StoreError::Serialization { message: err.to_string() })
	}

	fn decode(payload: &str) -> Result<TokenRecord, StoreError> {
		serde_json::from_str(payload)
			.map_err(|err| StoreError::Serialization { message: err.to_string() })
	}
}
impl Debug for RedisTokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisTokenStore").field("namespace", &self.namespace).finish()
	}
}
impl TokenStore for RedisTokenStore {
	fn fetch<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, Option<TokenRecord>> {
		let pool = self.pool.clone();
		let store_key = key.store_key(&self.namespace);

		Box::pin(async move {
			let payload: Option<String> = pool
				.get(store_key.as_str())
				.await
				.map_err(|err| StoreError::Backend { message: err.to_string() })?;

			payload.as_deref().map(Self::decode).transpose()
		})
	}

	fn save<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		record: TokenRecord,
	) -> StoreFuture<'a, ()> {
		let pool = self.pool.clone();
		let store_key = key.store_key(&self.namespace);

		Box::pin(async move {
			let payload = Self::encode(&record)?;
			let _: () = pool
				.set(store_key.as_str(), payload, None, None, false)
				.await
				.map_err(|err| StoreError::Backend { message: err.to_string() })?;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, ()> {
		let pool = self.pool.clone();
		let store_key = key.store_key(&self.namespace);

		Box::pin(async move {
			let _: u64 = pool
				.del(store_key.as_str())
				.await
				.map_err(|err| StoreError::Backend { message: err.to_string() })?;

			Ok(())
		})
	}
}
