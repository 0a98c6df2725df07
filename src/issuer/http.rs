//! Reqwest-backed [`TokenIssuer`] performing the `grant_type=refresh_token` exchange.

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError, Scope,
	TokenResponse, TokenUrl,
	basic::{
		BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse,
		BasicTokenType,
	},
};
use reqwest::{
	Client as ReqwestClient, Error as ReqwestError,
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_TOKEN_TYPE, PrincipalClientKey, ScopeSet, TokenRecord},
	error::{ConfigError, TransientError, TransportError},
	issuer::{ClientAuthMethod, IssuerConfig, IssuerFuture, TokenIssuer},
};

type RefreshOAuthClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Issuer client speaking the standard refresh-token grant over HTTPS.
///
/// Token requests never follow redirects, matching OAuth 2.0 guidance that token endpoints
/// answer directly instead of delegating to another URI.
pub struct HttpTokenIssuer {
	oauth_client: RefreshOAuthClient,
	http_client: ReqwestClient,
}
impl HttpTokenIssuer {
	/// Creates an issuer client, provisioning its own reqwest transport.
	pub fn new(config: IssuerConfig) -> Result<Self> {
		let http_client = ReqwestClient::builder()
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::from)?;

		Self::with_client(config, http_client)
	}

	/// Creates an issuer client on a caller-provided reqwest transport. The transport must be
	/// configured to not follow redirects.
	pub fn with_client(config: IssuerConfig, http_client: ReqwestClient) -> Result<Self> {
		let token_url = TokenUrl::new(config.token_endpoint.to_string())
			.map_err(|source| ConfigError::InvalidTokenEndpoint { source })?;
		let mut oauth_client =
			BasicClient::new(ClientId::new(config.client_id)).set_token_uri(token_url);

		if let Some(secret) = config.client_secret {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret));
		}
		if matches!(config.auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client })
	}
}
impl Debug for HttpTokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpTokenIssuer").finish()
	}
}
impl TokenIssuer for HttpTokenIssuer {
	fn refresh<'a>(
		&'a self,
		key: &'a PrincipalClientKey,
		current: &'a TokenRecord,
	) -> IssuerFuture<'a, TokenRecord> {
		Box::pin(async move {
			let refresh_secret =
				current.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?;

			if current.refresh_token_expired_at(OffsetDateTime::now_utc()) {
				return Err(Error::InvalidGrant {
					reason: "refresh token expired before the exchange".into(),
				});
			}

			tracing::debug!(%key, "exchanging refresh token");

			let slot = MetaSlot::default();
			let handle = MeteredHttpClient::new(self.http_client.clone(), slot.clone());
			let refresh_token = RefreshToken::new(refresh_secret.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_token);

			for scope in current.scope.iter() {
				request = request.add_scope(Scope::new(scope.to_owned()));
			}

			let response = request
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(slot.take(), err))?;

			map_refresh_response(current, response)
		})
	}
}

fn map_refresh_response(current: &TokenRecord, response: BasicTokenResponse) -> Result<TokenRecord> {
	let expires_in = response.expires_in().ok_or(ConfigError::MissingExpiresIn)?.as_secs();
	let expires_in = i64::try_from(expires_in).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let scope = match response.scopes() {
		Some(scopes) => ScopeSet::new(scopes.iter().map(|scope| scope.as_ref()))
			.map_err(ConfigError::from)?,
		None => current.scope.clone(),
	};
	let mut builder = TokenRecord::builder()
		.token_type(token_type_label(response.token_type()))
		.access_token(response.access_token().secret().to_owned())
		.issued_at(OffsetDateTime::now_utc())
		.expires_in(Duration::seconds(expires_in))
		.scope(scope);

	match response.refresh_token() {
		// Rotated secret; its lifetime is unknown until the issuer reports a new one.
		Some(rotated) => builder = builder.refresh_token(rotated.secret().to_owned()),
		None => {
			if let Some(secret) = &current.refresh_token {
				builder = builder.refresh_token(secret.expose().to_owned());
			}
			if let Some(expiry) = current.refresh_expires_at {
				builder = builder.refresh_expires_at(expiry);
			}
		},
	}

	builder.build().map_err(|err| ConfigError::from(err).into())
}

fn token_type_label(token_type: &BasicTokenType) -> String {
	match token_type {
		BasicTokenType::Bearer => DEFAULT_TOKEN_TYPE.into(),
		BasicTokenType::Mac => "MAC".into(),
		BasicTokenType::Extension(value) => value.clone(),
		_ => DEFAULT_TOKEN_TYPE.into(),
	}
}

fn map_request_error(
	meta: Option<ResponseMeta>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => map_server_error(response, meta_ref),
		RequestTokenError::Request(error) => map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, _body) =>
			TransientError::TokenResponseParse { source: error, status: meta_status(meta_ref) }
				.into(),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message: format!("Token endpoint returned an unexpected response: {message}"),
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	}
}

fn map_server_error(response: BasicErrorResponse, meta: Option<&ResponseMeta>) -> Error {
	use oauth2::basic::BasicErrorResponseType::*;

	let reason = if let Some(description) = response.error_description() {
		description.clone()
	} else {
		response.error().as_ref().to_owned()
	};

	match response.error() {
		InvalidGrant => Error::InvalidGrant { reason },
		InvalidClient | UnauthorizedClient => ConfigError::RejectedClient { reason }.into(),
		_ => TransientError::TokenEndpoint {
			message: format!("Token endpoint returned an OAuth error: {reason}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_transport_error(
	meta: Option<&ResponseMeta>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
		HttpClientError::Http(inner) => ConfigError::http_client_build(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint.".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMeta>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint.".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMeta>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMeta>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}

/// Status and retry-hint captured from the most recent HTTP response for error mapping.
#[derive(Clone, Debug, Default)]
struct ResponseMeta {
	status: Option<u16>,
	retry_after: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
struct MetaSlot(Arc<Mutex<Option<ResponseMeta>>>);
impl MetaSlot {
	fn store(&self, meta: ResponseMeta) {
		*self.0.lock() = Some(meta);
	}

	fn take(&self) -> Option<ResponseMeta> {
		self.0.lock().take()
	}
}

struct MeteredHttpClient {
	client: ReqwestClient,
	slot: MetaSlot,
}
impl MeteredHttpClient {
	fn new(client: ReqwestClient, slot: MetaSlot) -> Self {
		Self { client, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for MeteredHttpClient {
	type Error = HttpClientError<ReqwestError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			// Drain stale metadata so traces from prior attempts never leak into this one.
			self.slot.take();

			let response = self
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			self.slot.store(ResponseMeta { status: Some(status.as_u16()), retry_after });

			let mut mapped = HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*mapped.status_mut() = status;
			*mapped.headers_mut() = headers;

			Ok(mapped)
		})
	}
}

// Delta-seconds form only; HTTP-date hints are rare on token endpoints and simply dropped.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let secs = raw.parse::<i64>().ok()?;

	(secs >= 0).then(|| Duration::seconds(secs))
}
