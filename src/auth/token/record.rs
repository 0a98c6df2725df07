//! Immutable token record struct and builder.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, token::secret::TokenSecret},
};

/// Token type reported for bearer credentials when the issuer omits one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Errors produced by [`TokenRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum TokenRecordBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no expiry (absolute or relative) was configured.
	#[error("Expiry must be supplied via expires_at or expires_in.")]
	MissingExpiry,
}

/// Immutable record describing one cached access/refresh token pair.
///
/// A refresh produces a new record that replaces the stored one wholesale; records are never
/// mutated in place.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Token type presented to downstream services (typically `Bearer`).
	pub token_type: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant the record was issued.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry instant of the access token.
	pub expires_at: OffsetDateTime,
	/// Scopes the issuer granted for this record.
	pub scope: ScopeSet,
	/// Refresh token secret, if the issuer granted one.
	pub refresh_token: Option<TokenSecret>,
	/// Absolute expiry instant of the refresh token, when the issuer reports one.
	pub refresh_expires_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Returns a builder for constructing records.
	pub fn builder() -> TokenRecordBuilder {
		TokenRecordBuilder::new()
	}

	/// Returns true if the access token must be refreshed at `now`, applying the safety
	/// `buffer` so tokens never expire mid-flight.
	pub fn needs_refresh_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		self.expires_at <= now + buffer
	}

	/// Returns true if the access token has passed its real expiry at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.expires_at <= now
	}

	/// Returns true if the refresh token is known to be expired at `now`.
	///
	/// Records without a reported refresh expiry are assumed refreshable until the issuer
	/// says otherwise.
	pub fn refresh_token_expired_at(&self, now: OffsetDateTime) -> bool {
		self.refresh_expires_at.is_some_and(|expiry| expiry <= now)
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("token_type", &self.token_type)
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.field("scope", &self.scope)
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_expires_at", &self.refresh_expires_at)
			.finish()
	}
}

/// Builder for [`TokenRecord`].
#[derive(Clone, Debug, Default)]
pub struct TokenRecordBuilder {
	token_type: Option<String>,
	access_token: Option<TokenSecret>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
	scope: ScopeSet,
	refresh_token: Option<TokenSecret>,
	refresh_expires_at: Option<OffsetDateTime>,
}
impl TokenRecordBuilder {
	fn new() -> Self {
		Self::default()
	}

	/// Overrides the token type (defaults to `Bearer`).
	pub fn token_type(mut self, value: impl Into<String>) -> Self {
		self.token_type = Some(value.into());

		self
	}

	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Sets the granted scopes.
	pub fn scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the refresh token's absolute expiry instant.
	pub fn refresh_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.refresh_expires_at = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`TokenRecord`].
	pub fn build(self) -> Result<TokenRecord, TokenRecordBuilderError> {
		let access_token = self.access_token.ok_or(TokenRecordBuilderError::MissingAccessToken)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = match (self.expires_at, self.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(delta)) => issued_at + delta,
			(None, None) => return Err(TokenRecordBuilderError::MissingExpiry),
		};

		Ok(TokenRecord {
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			access_token,
			issued_at,
			expires_at,
			scope: self.scope,
			refresh_token: self.refresh_token,
			refresh_expires_at: self.refresh_expires_at,
		})
	}
}
