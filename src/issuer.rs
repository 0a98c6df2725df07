//! Token issuer client contracts for the refresh-token grant exchange.

#[cfg(feature = "reqwest")] pub mod http;

#[cfg(feature = "reqwest")] pub use http::HttpTokenIssuer;

// self
use crate::{
	_prelude::*,
	auth::{PrincipalClientKey, TokenRecord},
};

/// Boxed future returned by [`TokenIssuer`] operations.
pub type IssuerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Network client exchanging a refresh token for a new access/refresh pair.
///
/// The exchange is idempotent from the caller's perspective: transport failures are safe to
/// retry with backoff, but an [`InvalidGrant`](crate::error::Error::InvalidGrant) rejection is
/// terminal for the record and must not be retried automatically.
pub trait TokenIssuer
where
	Self: Send + Sync,
{
	/// Exchanges the record's refresh token for a new record.
	///
	/// The returned record carries the rotated refresh token when the issuer supplied one and
	/// the current record's refresh token (with its expiry) otherwise.
	fn refresh<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		current: &'a TokenRecord,
	) -> IssuerFuture<'a, TokenRecord>;
}

/// Client authentication mode applied on the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Credentials in the `Authorization: Basic` header (RFC 6749 default).
	#[default]
	ClientSecretBasic,
	/// Credentials in the request body.
	ClientSecretPost,
}

/// Static issuer-side identity of this cache: endpoint plus client credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuerConfig {
	/// Token endpoint URL of the identity provider.
	pub token_endpoint: Url,
	/// OAuth 2.0 client identifier presented on every exchange.
	pub client_id: String,
	/// Optional client secret for confidential clients.
	pub client_secret: Option<String>,
	/// Client authentication mode for the token endpoint.
	#[serde(default)]
	pub auth_method: ClientAuthMethod,
}
impl IssuerConfig {
	/// Creates a configuration for a public client.
	pub fn new(token_endpoint: Url, client_id: impl Into<String>) -> Self {
		Self {
			token_endpoint,
			client_id: client_id.into(),
			client_secret: None,
			auth_method: ClientAuthMethod::default(),
		}
	}

	/// Attaches a confidential client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Overrides the client authentication mode.
	pub fn with_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.auth_method = method;

		self
	}
}
