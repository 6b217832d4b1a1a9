//! High-level phase orchestrators: the authorization request and the callback.

pub mod callback;
pub mod request;

pub use callback::*;
pub use request::*;

// crates.io
use oauth2::{
	AsyncHttpClient,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION},
	},
};
// self
use crate::{
	_prelude::*,
	discovery::{self, DiscoveryCache, DiscoveryDocument, ProviderMetadata},
	error::{CallbackError, ConfigError, DiscoveryError},
	http::{ResponseMetadataSlot, StrategyHttpClient},
	oauth::{EndpointKind, TransportErrorMapper},
	options::StrategyOptions,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Strategy specialized for the crate's default reqwest transport stack.
pub type ReqwestStrategy = Strategy<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Coordinates the two authentication phases against a single provider.
///
/// The strategy owns the HTTP client, the resolved options, and the process-lifetime
/// discovery cache, so the phase implementations can focus on phase-specific logic
/// (state/nonce generation, callback validation, the code exchange, and token
/// verification). Session storage is supplied per call; it belongs to the inbound
/// request, not to the strategy.
#[derive(Clone)]
pub struct Strategy<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound provider request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Resolved, immutable strategy options.
	pub options: StrategyOptions,
	discovery: Arc<DiscoveryCache>,
}
impl<C, M> Strategy<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a strategy that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		options: StrategyOptions,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			options,
			discovery: Default::default(),
		}
	}

	/// Returns the provider metadata, fetching and caching it on first use.
	///
	/// Concurrent cold-cache callers are collapsed into a single fetch; once cached,
	/// the metadata is reused for the process lifetime.
	pub async fn resolve_metadata(&self) -> Result<Arc<ProviderMetadata>> {
		let issuer = self.options.issuer.as_str();

		if let Some(metadata) = self.discovery.get(issuer) {
			return Ok(metadata);
		}

		let guard = self.discovery.guard(issuer);
		let _singleflight = guard.lock().await;

		// A racing caller may have resolved while this one waited on the guard.
		if let Some(metadata) = self.discovery.get(issuer) {
			return Ok(metadata);
		}

		let url = discovery::well_known_url(issuer);
		let bytes = self.fetch_json(EndpointKind::Discovery, &url, None).await?;
		let document = DiscoveryDocument::parse(&bytes, &url)?;

		document.verify_issuer(issuer)?;

		let jwks_url = document.jwks_uri.to_string();
		let jwks_bytes = self.fetch_json(EndpointKind::Discovery, &jwks_url, None).await?;
		let jwks = discovery::parse_jwks(&jwks_bytes, &jwks_url)?;
		let metadata = Arc::new(ProviderMetadata::new(document, jwks));

		self.discovery.insert(issuer, metadata.clone());

		Ok(metadata)
	}

	/// Re-fetches the signing keys for the cached metadata.
	///
	/// Used once per callback at most, when the token references a key identifier
	/// the cached set does not contain.
	pub async fn refresh_keys(&self) -> Result<Arc<ProviderMetadata>> {
		let current = self.resolve_metadata().await?;
		let jwks_url = current.jwks_uri.to_string();
		let jwks_bytes = self.fetch_json(EndpointKind::Discovery, &jwks_url, None).await?;
		let jwks = discovery::parse_jwks(&jwks_bytes, &jwks_url)?;
		let refreshed = Arc::new(ProviderMetadata { jwks, ..(*current).clone() });

		self.discovery.insert(&self.options.issuer, refreshed.clone());

		Ok(refreshed)
	}

	pub(crate) async fn fetch_json(
		&self,
		endpoint: EndpointKind,
		url: &str,
		bearer: Option<&str>,
	) -> Result<Vec<u8>> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let mut builder = Request::builder()
			.method(Method::GET)
			.uri(url)
			.header(ACCEPT, "application/json");

		if let Some(token) = bearer {
			builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
		}

		let request = builder.body(Vec::new()).map_err(ConfigError::HttpRequest)?;
		let response = instrumented.call(request).await.map_err(|err| {
			self.transport_mapper.map_transport_error(endpoint, url, meta.take().as_ref(), err)
		})?;
		let status = response.status();

		if !status.is_success() {
			return Err(match endpoint {
				EndpointKind::Userinfo =>
					CallbackError::Userinfo { status: Some(status.as_u16()) }.into(),
				_ => DiscoveryError::Endpoint { status: status.as_u16(), url: url.into() }.into(),
			});
		}

		Ok(response.into_body())
	}
}
#[cfg(feature = "reqwest")]
impl Strategy<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a new strategy over the provided resolved options.
	///
	/// The strategy provisions its own reqwest-backed transport with the default
	/// request timeout and redirect following disabled, so callers do not need to
	/// pass HTTP handles explicitly.
	pub fn new(options: StrategyOptions) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(
			options,
			ReqwestHttpClient::bounded(crate::http::DEFAULT_TIMEOUT)?,
			Arc::new(ReqwestTransportErrorMapper),
		))
	}
}
impl<C, M> Debug for Strategy<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Strategy")
			.field("name", &self.options.name)
			.field("issuer", &self.options.issuer)
			.field("client_id", &self.options.client_options.identifier)
			.field("client_secret_set", &self.options.client_options.secret.is_some())
			.finish()
	}
}
