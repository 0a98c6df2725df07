//! In-process [`RefreshLock`] implementation for tests and single-node development.

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	lock::{LockFuture, OwnerToken, RefreshLock, to_std},
};

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

#[derive(Clone, Debug)]
struct Holder {
	token: OwnerToken,
	expires_at: Instant,
}

type LockMap = Arc<Mutex<HashMap<String, Holder>>>;

/// Lock table mirroring the networked semantics: per-acquisition owner tokens, lease
/// auto-expiry, and bounded cooperative waits.
#[derive(Clone, Debug, Default)]
pub struct MemoryLock(LockMap);
impl MemoryLock {
	fn try_acquire_now(map: &LockMap, lock_key: &str, lease: Duration) -> Option<OwnerToken> {
		let mut guard = map.lock();
		let now = Instant::now();

		if guard.get(lock_key).is_some_and(|holder| holder.expires_at > now) {
			return None;
		}

		let token = OwnerToken::generate();

		guard.insert(
			lock_key.to_owned(),
			Holder { token: token.clone(), expires_at: now + to_std(lease) },
		);

		Some(token)
	}
}
impl RefreshLock for MemoryLock {
	fn try_acquire<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		lease: Duration,
	) -> LockFuture<'a, Option<OwnerToken>> {
		let map = self.0.clone();

		Box::pin(async move {
			let deadline = Instant::now() + to_std(wait);

			loop {
				if let Some(token) = Self::try_acquire_now(&map, lock_key, lease) {
					return Ok(Some(token));
				}

				let remaining = deadline.saturating_duration_since(Instant::now());

				if remaining.is_zero() {
					return Ok(None);
				}

				tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
			}
		})
	}

	fn release<'a>(&'a self, lock_key: &'a str, token: &'a OwnerToken) -> LockFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			let mut guard = map.lock();

			if guard.get(lock_key).is_some_and(|holder| holder.token == *token) {
				guard.remove(lock_key);
			}

			Ok(())
		})
	}
}
