//! Refresh-ahead tunables consumed by the coordinator.

// self
use crate::{_prelude::*, auth::TokenRecord};

/// Externally supplied coordinator configuration.
///
/// Durations (de)serialize as whole seconds, matching the deployment configuration surface.
/// The lease must exceed the worst-case latency of one refresh-and-save cycle; the wait bounds
/// how long a non-holder blocks before giving up with
/// [`LockUnavailable`](crate::error::Error::LockUnavailable).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPolicy {
	/// Safety margin before actual expiry at which a proactive refresh is triggered.
	#[serde(default = "default_refresh_buffer", with = "seconds")]
	pub refresh_buffer: Duration,
	/// Bounded wait for the refresh lock before failing the authorize call.
	#[serde(default = "default_lock_wait", with = "seconds")]
	pub lock_wait: Duration,
	/// Lease after which an unreleased lock expires on its own.
	#[serde(default = "default_lock_lease", with = "seconds")]
	pub lock_lease: Duration,
	/// Namespace prefixed onto every lock key.
	#[serde(default = "default_lock_namespace")]
	pub lock_namespace: String,
}
impl RefreshPolicy {
	/// Overrides the refresh buffer.
	pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
		self.refresh_buffer = buffer;

		self
	}

	/// Overrides the lock wait window.
	pub fn with_lock_wait(mut self, wait: Duration) -> Self {
		self.lock_wait = wait;

		self
	}

	/// Overrides the lock lease.
	pub fn with_lock_lease(mut self, lease: Duration) -> Self {
		self.lock_lease = lease;

		self
	}

	/// Overrides the lock namespace.
	pub fn with_lock_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.lock_namespace = namespace.into();

		self
	}

	/// Determines whether the record's remaining lifetime is inside the refresh buffer.
	pub fn should_refresh(&self, record: &TokenRecord, now: OffsetDateTime) -> bool {
		record.needs_refresh_at(now, self.refresh_buffer)
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			refresh_buffer: default_refresh_buffer(),
			lock_wait: default_lock_wait(),
			lock_lease: default_lock_lease(),
			lock_namespace: default_lock_namespace(),
		}
	}
}

fn default_refresh_buffer() -> Duration {
	Duration::seconds(60)
}

fn default_lock_wait() -> Duration {
	Duration::seconds(5)
}

fn default_lock_lease() -> Duration {
	Duration::seconds(10)
}

fn default_lock_namespace() -> String {
	"refresh-lock".into()
}

mod seconds {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(duration.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}
