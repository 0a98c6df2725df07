// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for authorize/refresh outcomes.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	fresh_hits: AtomicU64,
	refreshes: AtomicU64,
	coalesced: AtomicU64,
	lock_timeouts: AtomicU64,
	failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of authorize attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts served straight from a fresh cached record.
	pub fn fresh_hits(&self) -> u64 {
		self.fresh_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of network refreshes performed by this process.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of refreshes skipped because another holder had already refreshed
	/// (the double-check hit).
	pub fn coalesced(&self) -> u64 {
		self.coalesced.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that gave up waiting for the refresh lock.
	pub fn lock_timeouts(&self) -> u64 {
		self.lock_timeouts.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that failed.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_fresh_hit(&self) {
		self.fresh_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_coalesced(&self) {
		self.coalesced.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_lock_timeout(&self) {
		self.lock_timeouts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
