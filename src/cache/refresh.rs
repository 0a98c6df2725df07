//! Lock-guarded refresh coordination with double-checked freshness.
//!
//! [`TokenCache::authorize`] delegates here once a cached record's remaining lifetime falls
//! inside the refresh buffer. The coordinator serializes on the cluster-wide lock key derived
//! from the principal + client pair, re-fetches after acquisition (another holder may have
//! refreshed in the meantime), and only then performs the `grant_type=refresh_token` exchange
//! and last-write-wins save. Release runs on every exit path; cancellation is covered by the
//! [`LockLease`] drop guard.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, TokenRecord},
	cache::TokenCache,
	lock::LockLease,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl TokenCache {
	/// Refreshes the record for `key` under the cluster-wide lock and returns the resulting
	/// record, which may have been produced by another holder.
	pub(crate) async fn refresh_via_lock(&self, key: &PrincipalClientKey) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_via_lock");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let lock_key = key.lock_key(&self.policy.lock_namespace);
				let lease = LockLease::acquire(
					self.lock.clone(),
					lock_key.clone(),
					self.policy.lock_wait,
					self.policy.lock_lease,
				)
				.await?;
				let Some(lease) = lease else {
					self.metrics.record_lock_timeout();
					tracing::warn!(%lock_key, "refresh lock not acquired within the wait window");

					return Err(Error::LockUnavailable {
						lock_key,
						waited: self.policy.lock_wait,
					});
				};
				let result = self.refresh_locked(key).await;

				// Success and error paths release here; the lease guard covers cancellation.
				lease.release().await;

				result
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn refresh_locked(&self, key: &PrincipalClientKey) -> Result<TokenRecord> {
		let now = OffsetDateTime::now_utc();
		// Double-check: the record may have been refreshed and released between the caller's
		// freshness check and this acquisition.
		let current = self.store.fetch(key).await?.ok_or_else(|| Error::NoAuthorizedClient {
			principal: key.principal.clone(),
			registration: key.registration.clone(),
		})?;

		if !self.policy.should_refresh(&current, now) {
			tracing::debug!(%key, expires_at = %current.expires_at, "token already refreshed by another holder");
			self.metrics.record_coalesced();

			return Ok(current);
		}

		// On issuer failure the stale record stays in the store untouched: callers holding an
		// older, still-valid token keep using it until its real expiry.
		let refreshed = self.issuer.refresh(key, &current).await?;

		if refreshed.expires_at < current.expires_at {
			tracing::warn!(
				%key,
				replaced = %current.expires_at,
				returned = %refreshed.expires_at,
				"issuer returned an earlier expiry than the replaced record",
			);
		}

		self.store.save(key, refreshed.clone()).await?;
		self.metrics.record_refresh();
		tracing::debug!(%key, expires_at = %refreshed.expires_at, "token refreshed and saved");

		Ok(refreshed)
	}
}
