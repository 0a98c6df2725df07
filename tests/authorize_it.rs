// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicU64, Ordering},
};
// crates.io
use time::{Duration, OffsetDateTime};
// self
use token_warden::{
	auth::{PrincipalClientKey, PrincipalId, RegistrationId, ScopeSet, TokenRecord},
	cache::{RefreshPolicy, TokenCache},
	error::{Error, Result, TransientError},
	issuer::{IssuerFuture, TokenIssuer},
	lock::{LockFuture, MemoryLock, OwnerToken, RefreshLock},
	store::{MemoryStore, StoreFuture, TokenStore},
};

fn principal() -> PrincipalId {
	PrincipalId::new("alice").expect("Principal fixture should be valid.")
}

fn registration() -> RegistrationId {
	RegistrationId::new("gitlab").expect("Registration fixture should be valid.")
}

fn key() -> PrincipalClientKey {
	PrincipalClientKey::new(principal(), registration())
}

fn record_expiring_in(lifetime: Duration, access: &str) -> TokenRecord {
	let now = OffsetDateTime::now_utc();

	TokenRecord::builder()
		.access_token(access)
		.refresh_token("refresh-seed")
		.scope(ScopeSet::new(["read"]).expect("Scope fixture should be valid."))
		.issued_at(now - Duration::minutes(5))
		.expires_at(now + lifetime)
		.build()
		.expect("Record fixture should build successfully.")
}

/// Store wrapper counting writes so tests can assert "exactly one record persisted".
#[derive(Debug, Default)]
struct CountingStore {
	inner: MemoryStore,
	saves: AtomicU64,
}
impl CountingStore {
	fn saves(&self) -> u64 {
		self.saves.load(Ordering::SeqCst)
	}
}
impl TokenStore for CountingStore {
	fn fetch<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, Option<TokenRecord>> {
		self.inner.fetch(key)
	}

	fn save<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		record: TokenRecord,
	) -> StoreFuture<'a, ()> {
		self.saves.fetch_add(1, Ordering::SeqCst);

		self.inner.save(key, record)
	}

	fn remove<'a>(&'a self, key: &'a PrincipalClientKey) -> StoreFuture<'a, ()> {
		self.inner.remove(key)
	}
}

/// Lock wrapper counting acquisition attempts so tests can assert "no lock touched".
#[derive(Debug, Default)]
struct CountingLock {
	inner: MemoryLock,
	acquires: AtomicU64,
}
impl CountingLock {
	fn acquires(&self) -> u64 {
		self.acquires.load(Ordering::SeqCst)
	}
}
impl RefreshLock for CountingLock {
	fn try_acquire<'a>(
		&'a self,
		lock_key: &'a str,
		wait: Duration,
		lease: Duration,
	) -> LockFuture<'a, Option<OwnerToken>> {
		self.acquires.fetch_add(1, Ordering::SeqCst);

		self.inner.try_acquire(lock_key, wait, lease)
	}

	fn release<'a>(&'a self, lock_key: &'a str, token: &'a OwnerToken) -> LockFuture<'a, ()> {
		self.inner.release(lock_key, token)
	}
}

/// Issuer double handing out sequentially numbered access tokens after an artificial delay.
#[derive(Debug)]
struct CountingIssuer {
	calls: AtomicU64,
	lifetime: Duration,
	delay: std::time::Duration,
}
impl CountingIssuer {
	fn new(lifetime: Duration, delay: std::time::Duration) -> Self {
		Self { calls: AtomicU64::new(0), lifetime, delay }
	}

	fn calls(&self) -> u64 {
		self.calls.load(Ordering::SeqCst)
	}
}
impl TokenIssuer for CountingIssuer {
	fn refresh<'a>(
		&'a self,
		_key: &'a PrincipalClientKey,
		current: &'a TokenRecord,
	) -> IssuerFuture<'a, TokenRecord> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			let nth = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

			Ok(TokenRecord::builder()
				.access_token(format!("access-refreshed-{nth}"))
				.refresh_token("refresh-rotated")
				.scope(current.scope.clone())
				.expires_in(self.lifetime)
				.build()
				.expect("Refreshed record fixture should build successfully."))
		})
	}
}

/// Issuer double that always reports a retryable upstream failure.
#[derive(Debug)]
struct FailingIssuer;
impl TokenIssuer for FailingIssuer {
	fn refresh<'a>(
		&'a self,
		_key: &'a PrincipalClientKey,
		_current: &'a TokenRecord,
	) -> IssuerFuture<'a, TokenRecord> {
		Box::pin(async {
			Err(TransientError::TokenEndpoint {
				message: "upstream unavailable".into(),
				status: Some(503),
				retry_after: None,
			}
			.into())
		})
	}
}

/// Issuer double that parks forever, flagging entry so tests can cancel mid-exchange.
#[derive(Debug, Default)]
struct BlockingIssuer {
	entered: AtomicBool,
}
impl BlockingIssuer {
	fn entered(&self) -> bool {
		self.entered.load(Ordering::SeqCst)
	}
}
impl TokenIssuer for BlockingIssuer {
	fn refresh<'a>(
		&'a self,
		_key: &'a PrincipalClientKey,
		_current: &'a TokenRecord,
	) -> IssuerFuture<'a, TokenRecord> {
		Box::pin(async {
			self.entered.store(true, Ordering::SeqCst);
			std::future::pending::<()>().await;

			unreachable!("The blocking issuer never completes.")
		})
	}
}

fn cache_with(
	store: Arc<dyn TokenStore>,
	lock: Arc<dyn RefreshLock>,
	issuer: Arc<dyn TokenIssuer>,
	policy: RefreshPolicy,
) -> TokenCache {
	TokenCache::new(store, lock, issuer, policy)
}

#[tokio::test(flavor = "multi_thread")]
async fn five_concurrent_calls_refresh_once() {
	let store = Arc::new(CountingStore::default());
	let lock = Arc::new(MemoryLock::default());
	let issuer =
		Arc::new(CountingIssuer::new(Duration::minutes(30), std::time::Duration::from_millis(50)));
	let cache =
		cache_with(store.clone(), lock, issuer.clone(), RefreshPolicy::default());

	// Expiring in 30 s with a 60 s buffer: every caller sees a stale record.
	cache
		.save_authorized(&key(), record_expiring_in(Duration::seconds(30), "access-stale"))
		.await
		.expect("Seeding the store should succeed.");

	let seed_saves = store.saves();
	let tasks: Vec<_> = (0..5)
		.map(|_| {
			let cache = cache.clone();

			tokio::spawn(async move { cache.authorize(principal(), registration()).await })
		})
		.collect();
	let mut access_tokens = Vec::new();

	for task in tasks {
		let record = task
			.await
			.expect("Authorize task should not panic.")
			.expect("Authorize should succeed for every concurrent caller.");

		access_tokens.push(record.access_token.expose().to_owned());
	}

	assert_eq!(issuer.calls(), 1, "Exactly one network refresh must occur.");
	assert_eq!(store.saves(), seed_saves + 1, "Exactly one new record must be persisted.");
	assert!(
		access_tokens.iter().all(|token| token == "access-refreshed-1"),
		"All callers must observe the same refreshed access token.",
	);
	assert_eq!(cache.metrics.refreshes(), 1);
	assert_eq!(
		cache.metrics.refreshes() + cache.metrics.coalesced() + cache.metrics.fresh_hits(),
		5,
		"Every caller resolves via refresh, double-check, or a fresh read.",
	);
}

#[tokio::test]
async fn fresh_token_is_served_without_lock_or_issuer() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(CountingLock::default());
	let issuer =
		Arc::new(CountingIssuer::new(Duration::minutes(30), std::time::Duration::ZERO));
	let cache = cache_with(store, lock.clone(), issuer.clone(), RefreshPolicy::default());

	cache
		.save_authorized(&key(), record_expiring_in(Duration::hours(1), "access-fresh"))
		.await
		.expect("Seeding the store should succeed.");

	let record = cache
		.authorize(principal(), registration())
		.await
		.expect("Fresh records should be served directly.");

	assert_eq!(record.access_token.expose(), "access-fresh");
	assert_eq!(issuer.calls(), 0, "No issuer call may happen for a fresh record.");
	assert_eq!(lock.acquires(), 0, "No lock may be touched for a fresh record.");
	assert_eq!(cache.metrics.fresh_hits(), 1);
}

#[tokio::test]
async fn absent_key_fails_with_no_authorized_client() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(MemoryLock::default());
	let issuer =
		Arc::new(CountingIssuer::new(Duration::minutes(30), std::time::Duration::ZERO));
	let cache = cache_with(store, lock, issuer.clone(), RefreshPolicy::default());
	let err = cache
		.authorize(principal(), registration())
		.await
		.expect_err("An absent key must fail.");

	assert!(matches!(err, Error::NoAuthorizedClient { .. }));
	assert!(!err.is_retryable());
	assert_eq!(issuer.calls(), 0);
}

#[tokio::test]
async fn double_check_skips_issuer_after_foreign_refresh() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(MemoryLock::default());
	let issuer =
		Arc::new(CountingIssuer::new(Duration::minutes(30), std::time::Duration::ZERO));
	let policy = RefreshPolicy::default().with_lock_wait(Duration::seconds(2));
	let cache = cache_with(store.clone(), lock.clone(), issuer.clone(), policy.clone());

	cache
		.save_authorized(&key(), record_expiring_in(Duration::seconds(30), "access-stale"))
		.await
		.expect("Seeding the store should succeed.");

	// Hold the lock the way a refreshing peer process would.
	let lock_key = key().lock_key(&policy.lock_namespace);
	let token = lock
		.try_acquire(&lock_key, Duration::ZERO, Duration::seconds(10))
		.await
		.expect("Acquisition should not fail.")
		.expect("The test must win the uncontended lock.");
	let waiter = {
		let cache = cache.clone();

		tokio::spawn(async move { cache.authorize(principal(), registration()).await })
	};

	// While the caller waits, the peer saves a fresh record and releases.
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	store
		.save(&key(), record_expiring_in(Duration::hours(1), "access-peer-refreshed"))
		.await
		.expect("Peer save should succeed.");
	lock.release(&lock_key, &token).await.expect("Peer release should succeed.");

	let record = waiter
		.await
		.expect("Authorize task should not panic.")
		.expect("The waiting caller should pick up the peer's record.");

	assert_eq!(record.access_token.expose(), "access-peer-refreshed");
	assert_eq!(issuer.calls(), 0, "The double-check must skip the redundant refresh.");
	assert_eq!(cache.metrics.coalesced(), 1);
}

#[tokio::test]
async fn lock_timeout_surfaces_lock_unavailable_without_leaking() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(MemoryLock::default());
	let issuer =
		Arc::new(CountingIssuer::new(Duration::minutes(30), std::time::Duration::ZERO));
	let policy = RefreshPolicy::default().with_lock_wait(Duration::milliseconds(100));
	let cache = cache_with(store, lock.clone(), issuer.clone(), policy.clone());

	cache
		.save_authorized(&key(), record_expiring_in(Duration::seconds(30), "access-stale"))
		.await
		.expect("Seeding the store should succeed.");

	let lock_key = key().lock_key(&policy.lock_namespace);
	let token = lock
		.try_acquire(&lock_key, Duration::ZERO, Duration::seconds(30))
		.await
		.expect("Acquisition should not fail.")
		.expect("The test must win the uncontended lock.");
	let err = cache
		.authorize(principal(), registration())
		.await
		.expect_err("A held lock must time the caller out.");

	assert!(matches!(err, Error::LockUnavailable { .. }));
	assert!(err.is_retryable(), "Lock timeouts are retryable, not hard failures.");
	assert_eq!(issuer.calls(), 0);
	assert_eq!(cache.metrics.lock_timeouts(), 1);

	// No orphaned acquisition state: once the holder releases, the retry succeeds.
	lock.release(&lock_key, &token).await.expect("Holder release should succeed.");

	let record: Result<_> = cache.authorize(principal(), registration()).await;

	assert_eq!(
		record.expect("The retry should succeed after release.").access_token.expose(),
		"access-refreshed-1",
	);
	assert_eq!(issuer.calls(), 1);
}

#[tokio::test]
async fn issuer_failure_releases_lock_and_keeps_stale_record() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(MemoryLock::default());
	let cache = cache_with(
		store.clone(),
		lock.clone(),
		Arc::new(FailingIssuer),
		RefreshPolicy::default(),
	);

	cache
		.save_authorized(&key(), record_expiring_in(Duration::seconds(30), "access-stale"))
		.await
		.expect("Seeding the store should succeed.");

	let err = cache
		.authorize(principal(), registration())
		.await
		.expect_err("Issuer failures must surface to the caller.");

	assert!(matches!(err, Error::Transient(_)));
	assert!(err.is_retryable());

	// Fail-open: the stale record stays in the store untouched.
	let stale = store
		.fetch(&key())
		.await
		.expect("Fetch should succeed.")
		.expect("The stale record must remain present.");

	assert_eq!(stale.access_token.expose(), "access-stale");

	// The lock was released on the failure path.
	let lock_key = key().lock_key(&cache.policy.lock_namespace);
	let reacquired = lock
		.try_acquire(&lock_key, Duration::ZERO, Duration::seconds(1))
		.await
		.expect("Acquisition should not fail.");

	assert!(reacquired.is_some(), "The lock must be free after an issuer failure.");
	assert_eq!(cache.metrics.failures(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_mid_refresh_releases_the_lock() {
	let store = Arc::new(MemoryStore::default());
	let lock = Arc::new(MemoryLock::default());
	let issuer = Arc::new(BlockingIssuer::default());
	let cache = cache_with(store, lock.clone(), issuer.clone(), RefreshPolicy::default());

	cache
		.save_authorized(&key(), record_expiring_in(Duration::seconds(30), "access-stale"))
		.await
		.expect("Seeding the store should succeed.");

	let task = {
		let cache = cache.clone();

		tokio::spawn(async move { cache.authorize(principal(), registration()).await })
	};

	// Wait until the coordinator holds the lock and is parked inside the issuer exchange.
	for _ in 0..1_000 {
		if issuer.entered() {
			break;
		}

		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	}

	assert!(issuer.entered(), "The coordinator should reach the issuer exchange.");

	task.abort();

	let joined = task.await;

	assert!(joined.expect_err("The aborted task must not complete.").is_cancelled());

	// The lease guard spawns the release on the cancellation path; the lock must come free
	// well before its 10 s lease would expire.
	let lock_key = key().lock_key(&cache.policy.lock_namespace);
	let reacquired = lock
		.try_acquire(&lock_key, Duration::seconds(2), Duration::seconds(1))
		.await
		.expect("Acquisition should not fail.");

	assert!(reacquired.is_some(), "Cancellation must release the refresh lock.");
}
