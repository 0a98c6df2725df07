//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, TokenRecord},
	store::{StoreFuture, TokenStore},
};

type StoreMap = Arc<RwLock<HashMap<PrincipalClientKey, TokenRecord>>>;

/// Storage backend that keeps records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl MemoryStore {
	/// Returns the number of records currently held.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true if the store holds no records.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl TokenStore for MemoryStore {
	fn fetch<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, Option<TokenRecord>> {
		let map = self.0.clone();
		let key = key.clone();

		Box::pin(async move { Ok(map.read().get(&key).cloned()) })
	}

	fn save<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		record: TokenRecord,
	) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.clone();

		Box::pin(async move {
			map.write().insert(key, record);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.clone();

		Box::pin(async move {
			map.write().remove(&key);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{PrincipalId, RegistrationId};

	fn key(principal: &str) -> PrincipalClientKey {
		PrincipalClientKey::new(
			PrincipalId::new(principal).expect("Principal fixture should be valid."),
			RegistrationId::new("gitlab").expect("Registration fixture should be valid."),
		)
	}

	fn record(access: &str) -> TokenRecord {
		TokenRecord::builder()
			.access_token(access)
			.refresh_token("refresh")
			.issued_at(macros::datetime!(2025-06-01 00:00 UTC))
			.expires_in(Duration::minutes(30))
			.build()
			.expect("Record fixture should build successfully.")
	}

	#[tokio::test]
	async fn save_fetch_remove_round_trip() {
		let store = MemoryStore::default();
		let key = key("alice");

		assert!(store.fetch(&key).await.expect("Fetch should succeed.").is_none());

		store.save(&key, record("first")).await.expect("Save should succeed.");

		let fetched = store
			.fetch(&key)
			.await
			.expect("Fetch should succeed.")
			.expect("Record should be present after save.");

		assert_eq!(fetched.access_token.expose(), "first");

		store.remove(&key).await.expect("Remove should succeed.");

		assert!(store.fetch(&key).await.expect("Fetch should succeed.").is_none());
		assert!(store.is_empty());
	}

	#[tokio::test]
	async fn save_is_last_write_wins() {
		let store = MemoryStore::default();
		let key = key("bob");

		store.save(&key, record("old")).await.expect("First save should succeed.");
		store.save(&key, record("new")).await.expect("Second save should succeed.");

		let fetched = store
			.fetch(&key)
			.await
			.expect("Fetch should succeed.")
			.expect("Record should be present after overwrite.");

		assert_eq!(fetched.access_token.expose(), "new");
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn removing_an_absent_key_is_not_an_error() {
		let store = MemoryStore::default();

		store.remove(&key("ghost")).await.expect("Removing an absent key should succeed.");
	}
}
