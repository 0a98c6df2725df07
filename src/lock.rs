//! Cluster-wide mutual-exclusion locks bounding the refresh fan-out to one holder per key.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryLock;
#[cfg(feature = "redis")] pub use redis::RedisRefreshLock;

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const OWNER_TOKEN_LEN: usize = 22;

/// Boxed future returned by [`RefreshLock`] operations.
pub type LockFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LockError>> + 'a + Send>>;

/// Cluster-wide mutual-exclusion contract guarding the refresh right for a key.
///
/// The lease must exceed the worst-case latency of one refresh-and-save cycle: when a holder
/// crashes or is cancelled before releasing, the lease's automatic expiry is the sole recovery
/// mechanism.
pub trait RefreshLock
where
	Self: Send + Sync,
{
	/// Attempts to acquire the lock, waiting cooperatively up to `wait`.
	///
	/// Returns the owner token on success and `None` when the wait window elapsed while another
	/// holder kept the lock. The acquisition is honored for at most `lease` before expiring on
	/// its own.
	fn try_acquire<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		lease: Duration,
	) -> LockFuture<'a, Option<OwnerToken>>;

	/// Releases the lock if `token` still owns it. Idempotent; releasing an expired or
	/// re-acquired lock is a no-op.
	fn release<'a>(&'a self, lock_key: &'a str, token: &'a OwnerToken) -> LockFuture<'a, ()>;
}

/// Error type produced by [`RefreshLock`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum LockError {
	/// Backend-level failure for the lock engine.
	#[error("Lock backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Per-acquisition owner token proving which holder a release belongs to.
///
/// A fresh token is generated for every acquisition so a release can never delete a lock that
/// has since expired and been re-acquired by another process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerToken(String);
impl OwnerToken {
	/// Generates a fresh random token.
	pub fn generate() -> Self {
		let value: String =
			rand::rng().sample_iter(Alphanumeric).take(OWNER_TOKEN_LEN).map(char::from).collect();

		Self(value)
	}

	/// Returns the token value.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl From<&str> for OwnerToken {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}

/// Scoped ownership of an acquired refresh lock.
///
/// Release runs on every exit path: [`release`](Self::release) covers the normal and error
/// returns, and the `Drop` impl covers cancellation by spawning the release onto the current
/// runtime. Failures are logged, never surfaced; the lease expiry is the correctness backstop.
#[must_use = "dropping the lease without awaiting release defers cleanup to a spawned task"]
pub struct LockLease {
	lock: Arc<dyn RefreshLock>,
	lock_key: String,
	token: Option<OwnerToken>,
}
impl LockLease {
	/// Attempts the acquisition and wraps a successful one in a lease guard.
	pub async fn acquire(
		lock: Arc<dyn RefreshLock>,
		lock_key: String,
		wait: Duration,
		lease: Duration,
	) -> Result<Option<Self>, LockError> {
		let token = lock.try_acquire(&lock_key, wait, lease).await?;

		Ok(token.map(|token| Self { lock, lock_key, token: Some(token) }))
	}

	/// Releases the lock, logging (never propagating) any failure.
	pub async fn release(mut self) {
		if let Some(token) = self.token.take() {
			release_quietly(self.lock.as_ref(), &self.lock_key, &token).await;
		}
	}
}
impl Debug for LockLease {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LockLease")
			.field("lock_key", &self.lock_key)
			.field("held", &self.token.is_some())
			.finish()
	}
}
impl Drop for LockLease {
	fn drop(&mut self) {
		let Some(token) = self.token.take() else {
			return;
		};
		let lock = Arc::clone(&self.lock);
		let lock_key = std::mem::take(&mut self.lock_key);

		// Cancellation path: the surrounding future was dropped mid-flight, so release
		// asynchronously. Without a runtime the lease expiry reclaims the lock.
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move {
					release_quietly(lock.as_ref(), &lock_key, &token).await;
				});
			},
			Err(_) =>
				tracing::warn!(%lock_key, "no async runtime on drop; waiting out the lock lease"),
		}
	}
}

async fn release_quietly(lock: &dyn RefreshLock, lock_key: &str, token: &OwnerToken) {
	match lock.release(lock_key, token).await {
		Ok(()) => tracing::debug!(%lock_key, "refresh lock released"),
		Err(error) => {
			tracing::warn!(%lock_key, %error, "refresh lock release failed; lease expiry will reclaim it");
		},
	}
}

pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or(std::time::Duration::ZERO)
}
