//! Authorization facade owning the store, lock, and issuer capabilities.

pub mod policy;
pub mod refresh;

mod metrics;

pub use metrics::RefreshMetrics;
pub use policy::RefreshPolicy;

// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, PrincipalId, RegistrationId, TokenRecord},
	issuer::TokenIssuer,
	lock::RefreshLock,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Distributed refresh-ahead token cache.
///
/// The cache owns the store, lock, and issuer capabilities via explicit constructor injection so
/// individual deployments can swap any of them (notably for in-memory test doubles). It holds no
/// token state of its own beyond what the store already has; one instance is shared per process
/// and invoked once per outgoing request.
#[derive(Clone)]
pub struct TokenCache {
	/// Shared record persistence reachable from every process instance.
	pub store: Arc<dyn TokenStore>,
	/// Cluster-wide mutual-exclusion service gating refreshes.
	pub lock: Arc<dyn RefreshLock>,
	/// Network client performing the refresh-token grant exchange.
	pub issuer: Arc<dyn TokenIssuer>,
	/// Refresh-ahead tunables and lock namespace.
	pub policy: RefreshPolicy,
	/// Shared counters for refresh flow outcomes.
	pub metrics: Arc<RefreshMetrics>,
}
impl TokenCache {
	/// Creates a cache from its injected capabilities and policy.
	pub fn new(
		store: Arc<dyn TokenStore>,
		lock: Arc<dyn RefreshLock>,
		issuer: Arc<dyn TokenIssuer>,
		policy: RefreshPolicy,
	) -> Self {
		Self { store, lock, issuer, policy, metrics: Default::default() }
	}

	/// Returns a currently-valid token record for the principal + client pair, refreshing it
	/// behind the cluster-wide lock when its remaining lifetime is inside the refresh buffer.
	///
	/// This is the single entry point invoked once per outgoing proxied call. All coordinator
	/// errors propagate typed and unmodified; see [`Error`] for the taxonomy.
	pub async fn authorize(
		&self,
		principal: PrincipalId,
		registration: RegistrationId,
	) -> Result<TokenRecord> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "authorize");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.metrics.record_attempt();

				let key = PrincipalClientKey::new(principal, registration);
				let now = OffsetDateTime::now_utc();
				let current = self.store.fetch(&key).await?.ok_or_else(|| {
					Error::NoAuthorizedClient {
						principal: key.principal.clone(),
						registration: key.registration.clone(),
					}
				})?;

				if !self.policy.should_refresh(&current, now) {
					tracing::debug!(%key, expires_at = %current.expires_at, "cached token is fresh");
					self.metrics.record_fresh_hit();

					return Ok(current);
				}

				tracing::debug!(%key, expires_at = %current.expires_at, "cached token needs refresh");

				self.refresh_via_lock(&key).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(error) => {
				tracing::debug!(%error, "authorize failed");
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	/// Persists the very first record for a key, produced by an authorization-code exchange
	/// outside this crate.
	///
	/// This is the only write performed without the refresh lock; it is not racy because the
	/// record stems from a unique, single-use authorization code.
	pub async fn save_authorized(
		&self,
		key: &PrincipalClientKey,
		record: TokenRecord,
	) -> Result<()> {
		self.store.save(key, record).await?;

		tracing::debug!(%key, "initial token record saved");

		Ok(())
	}

	/// Removes the record for a key (logout/revocation). Removing an absent key succeeds.
	pub async fn remove_authorized(&self, key: &PrincipalClientKey) -> Result<()> {
		self.store.remove(key).await?;

		tracing::debug!(%key, "token record removed");

		Ok(())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").field("policy", &self.policy).finish()
	}
}
