//! Redis-backed [`RefreshLock`] using `SET NX PX` with a compare-and-delete release.

// crates.io
use fred::{
	clients::Pool,
	interfaces::{KeysInterface, LuaInterface},
	types::{Expiration, SetOptions},
};
// self
use crate::{
	_prelude::*,
	lock::{LockError, LockFuture, OwnerToken, RefreshLock, to_std},
};

const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);
// Deletes the key only while the caller's owner token still holds it, so a release can never
// clobber a lock that expired and was re-acquired elsewhere.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
	return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Fleet-wide lock client: `SET lock_key owner NX PX lease` to acquire, Lua
/// compare-and-delete to release, bounded polling while another process holds the key.
#[derive(Clone)]
pub struct RedisRefreshLock {
	pool: Pool,
}
impl RedisRefreshLock {
	/// Creates a lock client on an established connection pool.
	pub fn new(pool: Pool) -> Self {
		Self { pool }
	}

	async fn try_acquire_now(
		pool: &Pool,
		lock_key: &str,
		token: &OwnerToken,
		lease_ms: i64,
	) -> Result<bool, LockError> {
		// SET ... NX returns OK when the key was set, nil while another holder keeps it.
		let outcome: Option<String> = pool
			.set(
				lock_key,
				token.as_str(),
				Some(Expiration::PX(lease_ms)),
				Some(SetOptions::NX),
				false,
			)
			.await
			.map_err(|err| LockError::Backend { message: err.to_string() })?;

		Ok(outcome.is_some())
	}
}
impl Debug for RedisRefreshLock {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RedisRefreshLock").finish()
	}
}
impl RefreshLock for RedisRefreshLock {
	fn try_acquire<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		lease: Duration,
	) -> LockFuture<'a, Option<OwnerToken>> {
		let pool = self.pool.clone();

		Box::pin(async move {
			let token = OwnerToken::generate();
			let lease_ms = i64::try_from(to_std(lease).as_millis()).unwrap_or(i64::MAX).max(1);
			let deadline = std::time::Instant::now() + to_std(wait);

			loop {
				if Self::try_acquire_now(&pool, lock_key, &token, lease_ms).await? {
					tracing::debug!(%lock_key, "refresh lock acquired");

					return Ok(Some(token));
				}

				let remaining = deadline.saturating_duration_since(std::time::Instant::now());

				if remaining.is_zero() {
					tracing::debug!(%lock_key, "refresh lock wait window elapsed");

					return Ok(None);
				}

				tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
			}
		})
	}

	fn release<'a>(&'a self, lock_key: &'a str, token: &'a OwnerToken) -> LockFuture<'a, ()> {
		let pool = self.pool.clone();

		Box::pin(async move {
			let released: i64 = pool
				.eval(
					RELEASE_SCRIPT,
					vec![lock_key.to_owned()],
					vec![token.as_str().to_owned()],
				)
				.await
				.map_err(|err| LockError::Backend { message: err.to_string() })?;

			if released == 0 {
				tracing::debug!(%lock_key, "lock already expired or re-acquired; nothing released");
			}

			Ok(())
		})
	}
}
