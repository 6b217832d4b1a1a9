//! Token-exchange facade over the `oauth2` client.
//!
//! The facade owns the configured `oauth2` client and translates its layered error
//! type into the strategy's flat taxonomy. The token response is extended with the
//! `id_token` field the standard response type does not carry.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, RedirectUrl, RequestTokenError, StandardRevocableToken,
	StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	discovery::ProviderMetadata,
	error::{CallbackError, ConfigError, DiscoveryError, TokenExchangeError},
	http::{ResponseMetadata, ResponseMetadataSlot, StrategyHttpClient},
	options::{ClientAuthMethod, StrategyOptions},
};

type ConfiguredOidcClient = oauth2::Client<
	BasicErrorResponse,
	OidcTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Token response extended with the OIDC `id_token` field.
pub type OidcTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// Extra token-endpoint response fields beyond the OAuth 2.0 core set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Signed identity token; its absence fails the exchange.
	#[serde(default)]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Raw tokens carried out of a successful code exchange.
///
/// Values are passed through exactly as the provider returned them; the identity
/// token is verified separately before any of this reaches the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
	/// Bearer access token.
	pub access_token: String,
	/// Signed identity token, still unverified at this point.
	pub id_token: String,
	/// Token type reported by the provider.
	pub token_type: String,
	/// Raw `expires_in` seconds, when supplied.
	pub expires_in: Option<i64>,
}

/// Which provider endpoint a transport error occurred against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
	/// Discovery document or JWKS fetch.
	Discovery,
	/// Authorization-code exchange.
	Token,
	/// Optional userinfo fetch.
	Userinfo,
}

/// Maps HTTP transport failures into strategy [`Error`] values.
///
/// The mapper receives the endpoint the request targeted so the same transport
/// failure lands in the right branch of the taxonomy (discovery errors for metadata
/// fetches, exchange errors for token calls, callback errors for userinfo).
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a strategy error.
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		url: &str,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		url: &str,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, url, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => map_opaque_error(endpoint, url, meta, Box::new(inner)),
			HttpClientError::Other(message) => map_opaque_error(endpoint, url, meta, message.into()),
			_ => map_opaque_error(
				endpoint,
				url,
				meta,
				"HTTP client reported an unclassified error.".into(),
			),
		}
	}
}

/// Facade over the configured `oauth2` client for the authorization-code exchange.
pub(crate) struct ExchangeFacade<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredOidcClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ExchangeFacade<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Configures the `oauth2` client from resolved options and discovered metadata.
	pub(crate) fn from_metadata(
		options: &StrategyOptions,
		metadata: &ProviderMetadata,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let client_id = ClientId::new(options.client_id()?.to_owned());
		let auth_url = AuthUrl::from_url(metadata.authorization_endpoint.clone());
		let token_url = TokenUrl::from_url(metadata.token_endpoint.clone());
		let redirect_url = RedirectUrl::new(options.redirect_uri()?.to_owned())
			.map_err(|source| ConfigError::InvalidRedirect { source })?;
		let mut oauth_client = oauth2::Client::new(client_id)
			.set_auth_uri(auth_url)
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url);

		if let Some(secret) = options.client_options.secret.as_deref() {
			oauth_client = oauth_client.set_client_secret(ClientSecret::new(secret.to_owned()));
		}
		if matches!(options.client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self { oauth_client, http_client, error_mapper })
	}

	/// Exchanges the authorization code for the provider's token set.
	pub(crate) fn exchange_code<'a, 'code>(&'a self, code: &'code str) -> FacadeFuture<'a, TokenSet>
	where
		'code: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let token_url = self.oauth_client.token_uri().to_string();
			let request = self.oauth_client.exchange_code(AuthorizationCode::new(code.to_owned()));
			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(&token_url, meta.take(), err, self.error_mapper.as_ref())
			})?;

			map_token_response(response)
		})
	}
}

fn map_token_response(response: OidcTokenResponse) -> Result<TokenSet> {
	let id_token = response
		.extra_fields()
		.id_token
		.clone()
		.ok_or(TokenExchangeError::MissingIdToken)?;
	let token_type = match response.token_type() {
		BasicTokenType::Bearer => "bearer".to_owned(),
		BasicTokenType::Mac => "mac".to_owned(),
		BasicTokenType::Extension(value) => value.clone(),
		_ => "unknown".to_owned(),
	};
	let expires_in = response.expires_in().and_then(|value| i64::try_from(value.as_secs()).ok());

	Ok(TokenSet {
		access_token: response.access_token().secret().to_owned(),
		id_token,
		token_type,
		expires_in,
	})
}

fn map_request_error<E, M>(
	token_url: &str,
	meta: Option<ResponseMetadata>,
	err: RequestTokenError<HttpClientError<E>, BasicErrorResponse>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) => TokenExchangeError::Rejected {
			error: response.error().as_ref().to_owned(),
			description: response.error_description().cloned(),
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Request(error) =>
			mapper.map_transport_error(EndpointKind::Token, token_url, meta_ref, error),
		RequestTokenError::Parse(error, _body) => TokenExchangeError::MalformedResponse {
			source: error,
			status: meta_status(meta_ref),
		}
		.into(),
		RequestTokenError::Other(message) => TokenExchangeError::Endpoint {
			message,
			status: meta_status(meta_ref),
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: EndpointKind,
	url: &str,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return match endpoint {
			EndpointKind::Discovery => DiscoveryError::Timeout { url: url.into() }.into(),
			EndpointKind::Token => TokenExchangeError::Timeout.into(),
			EndpointKind::Userinfo =>
				CallbackError::Userinfo { status: meta_status(meta) }.into(),
		};
	}

	map_opaque_error(endpoint, url, meta, Box::new(err))
}

/// Routes an opaque transport failure into the taxonomy branch matching the endpoint.
///
/// Exposed for custom [`TransportErrorMapper`] implementations.
pub fn map_opaque_error(
	endpoint: EndpointKind,
	url: &str,
	meta: Option<&ResponseMetadata>,
	source: Box<dyn StdError + Send + Sync>,
) -> Error {
	match endpoint {
		EndpointKind::Discovery => DiscoveryError::Unreachable { url: url.into(), source }.into(),
		EndpointKind::Token => TokenExchangeError::Network { source }.into(),
		EndpointKind::Userinfo => CallbackError::Userinfo { status: meta_status(meta) }.into(),
	}
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}
