//! Crate-level error types shared across the cache, stores, locks, and issuer client.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, RegistrationId},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Everything except best-effort lock releases bubbles unmodified to the
/// [`authorize`](crate::cache::TokenCache::authorize) caller; release failures are logged inside
/// [`LockLease`](crate::lock::LockLease) because correctness relies on the lease expiring, not on
/// explicit release succeeding.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store I/O failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Lock service I/O failure, distinct from a bounded-wait timeout.
	#[error("{0}")]
	LockFailed(
		#[from]
		#[source]
		crate::lock::LockError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary issuer failure; the caller may retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The refresh lock was not acquired within the configured wait window.
	#[error("Refresh lock `{lock_key}` was not acquired within {waited}.")]
	LockUnavailable {
		/// Lock key that was contended.
		lock_key: String,
		/// Wait window that elapsed before giving up.
		waited: Duration,
	},
	/// No token record exists for the key; distinct from an expired record.
	#[error("No authorized client for principal `{principal}` and registration `{registration}`.")]
	NoAuthorizedClient {
		/// Principal half of the missing key.
		principal: PrincipalId,
		/// Client-registration half of the missing key.
		registration: RegistrationId,
	},
	/// The issuer rejected the refresh token; the principal must re-authenticate.
	#[error("Issuer rejected the grant: {reason}.")]
	InvalidGrant {
		/// Issuer- or cache-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns true for failures the caller may reasonably retry.
	///
	/// [`Error::InvalidGrant`] is terminal and must never be retried automatically.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::LockUnavailable { .. } | Self::Transient(_) | Self::Transport(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Issuer token endpoint is not a valid URL.
	#[error("Issuer token endpoint is invalid.")]
	InvalidTokenEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Issuer rejected this cache's client credentials.
	#[error("Issuer rejected the client credentials: {reason}.")]
	RejectedClient {
		/// Issuer-supplied reason string.
		reason: String,
	},
	/// Cached record carries no refresh token to exchange.
	#[error("Cached token record is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Returned scopes cannot be normalized.
	#[error("Granted scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Token record builder validation failed.
	#[error("Unable to build token record.")]
	TokenBuild(#[from] crate::auth::TokenRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary issuer failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Issuer- or cache-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		Self::network(e)
	}
}
