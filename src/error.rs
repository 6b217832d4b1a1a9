//! Strategy-level error types shared across phases, discovery, and verification.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical strategy error exposed by public APIs.
///
/// Every failure on the callback path surfaces as exactly one of these kinds so hosts
/// can log the specific cause while treating the attempt as a single authentication
/// failure. None of them are retried internally; authorization codes and identity
/// tokens are single-use.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem, fatal at construction time.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session-store failure reported by the host's backend.
	#[error("{0}")]
	Session(
		#[from]
		#[source]
		crate::session::SessionError,
	),
	/// Provider metadata or signing keys could not be obtained.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Callback state did not match the value stored during the request phase.
	#[error(transparent)]
	Csrf(#[from] CsrfError),
	/// Callback was structurally invalid or carried a provider error.
	#[error(transparent)]
	Callback(#[from] CallbackError),
	/// Token endpoint rejected or mangled the authorization code exchange.
	#[error(transparent)]
	Exchange(#[from] TokenExchangeError),
	/// Identity token failed one of the ordered verification checks.
	#[error(transparent)]
	Verification(#[from] VerificationError),
}

/// Configuration and validation failures raised while resolving strategy options.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Configured issuer is not a valid URL.
	#[error("Issuer is not a valid URL: {issuer}.")]
	InvalidIssuer {
		/// The rejected issuer string.
		issuer: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Requested scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),

	/// Client identifier is required before the request phase can run.
	#[error("Client options are missing the client identifier.")]
	MissingClientId,
	/// Redirect URI is required before the request phase can run.
	#[error("Client options are missing the redirect URI.")]
	MissingRedirectUri,
	/// Only the Authorization Code flow is implemented.
	#[error("Unsupported response type: {requested}; only `code` is supported.")]
	UnsupportedResponseType {
		/// The rejected `response_type` override.
		requested: String,
	},
	/// Provider metadata is always fetched; static configuration is not supported.
	#[error("Discovery cannot be disabled; provider metadata is always fetched.")]
	DiscoveryRequired,
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

/// Failures while fetching or parsing provider metadata and signing keys.
///
/// Fatal to the phase that triggered the fetch; a previously cached entry stays
/// valid for the process lifetime, so these only ever surface on a cold cache or
/// an explicit key refresh.
#[derive(Debug, ThisError)]
pub enum DiscoveryError {
	/// The discovery or JWKS endpoint could not be reached.
	#[error("Provider metadata endpoint is unreachable: {url}.")]
	Unreachable {
		/// Endpoint that failed.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The fetch exceeded the transport's bounded timeout.
	#[error("Provider metadata fetch timed out: {url}.")]
	Timeout {
		/// Endpoint that failed.
		url: String,
	},
	/// The endpoint answered with a non-2xx status.
	#[error("Provider metadata endpoint returned HTTP {status}: {url}.")]
	Endpoint {
		/// HTTP status code.
		status: u16,
		/// Endpoint that failed.
		url: String,
	},
	/// The document could not be parsed into the expected shape.
	#[error("Provider metadata document is malformed: {url}.")]
	Malformed {
		/// Endpoint that produced the document.
		url: String,
		/// Structured parsing failure naming the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The document's `issuer` field does not match the configured issuer.
	#[error("Discovery document issuer `{actual}` does not match configured issuer `{expected}`.")]
	IssuerMismatch {
		/// Configured issuer.
		expected: String,
		/// Issuer advertised by the document.
		actual: String,
	},
	/// The JWKS document contains no keys.
	#[error("Provider published an empty signing key set.")]
	EmptyKeySet,
}

/// Cross-site request forgery detection on the callback.
///
/// All variants are security relevant and abort the callback before any network
/// call is made.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CsrfError {
	/// No state was stored in the session, or it was already consumed.
	#[error("No authorization state is stored in the session.")]
	MissingSessionState,
	/// The callback carried no `state` parameter.
	#[error("Callback is missing the state parameter.")]
	MissingStateParameter,
	/// The inbound state differs from the stored value.
	#[error("Callback state does not match the stored authorization state.")]
	StateMismatch,
}

/// Structural callback failures after the state check passed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CallbackError {
	/// Provider returned an `error` parameter instead of a code.
	#[error("Provider returned an error on callback: {error}.")]
	Provider {
		/// OAuth error code from the provider.
		error: String,
		/// Optional human-readable description.
		error_description: Option<String>,
	},
	/// Callback carried neither a code nor an error.
	#[error("Callback is missing the authorization code.")]
	MissingCode,
	/// No nonce was stored in the session for this attempt.
	#[error("No nonce is stored in the session.")]
	MissingNonce,
	/// The optional userinfo fetch failed.
	#[error("Userinfo endpoint request failed.")]
	Userinfo {
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Failures while exchanging the authorization code for tokens.
#[derive(Debug, ThisError)]
pub enum TokenExchangeError {
	/// Provider rejected the code exchange with an OAuth error response.
	#[error("Token endpoint rejected the exchange: {error}.")]
	Rejected {
		/// OAuth error code.
		error: String,
		/// Optional `error_description` field.
		description: Option<String>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token response omitted the identity token.
	#[error("Token endpoint response is missing id_token.")]
	MissingIdToken,
	/// The exchange exceeded the transport's bounded timeout.
	#[error("Token endpoint request timed out.")]
	Timeout,
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Token endpoint returned an unexpected but well-formed failure.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TokenExchangeError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}

/// Identity token verification failures, one per ordered check.
///
/// None of these are retried; the only permitted recovery is a single JWKS
/// refresh on [`VerificationError::UnknownKey`], handled by the callback flow.
#[derive(Debug, ThisError)]
pub enum VerificationError {
	/// Token is unsigned or declares the `none` algorithm.
	#[error("Identity token is unsigned.")]
	Unsigned,
	/// Token header or payload could not be decoded.
	#[error("Identity token is malformed.")]
	Malformed {
		/// Underlying decode failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Header carries no key identifier and the key set is ambiguous.
	#[error("Identity token header is missing the key identifier.")]
	MissingKeyId,
	/// No published key matches the token's key identifier.
	#[error("No signing key matches kid `{kid}`.")]
	UnknownKey {
		/// Key identifier from the token header.
		kid: String,
	},
	/// The matching JWK could not be converted into a verification key.
	#[error("Published signing key is unusable.")]
	InvalidKey {
		/// Underlying key conversion failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// The matched key declares a different algorithm than the token header.
	#[error("Key algorithm {key} does not match token algorithm {token}.")]
	AlgorithmMismatch {
		/// Algorithm declared by the JWK.
		key: String,
		/// Algorithm declared by the token header.
		token: String,
	},
	/// Signature verification failed.
	#[error("Identity token signature is invalid.")]
	Signature,
	/// `iss` claim does not equal the configured issuer.
	#[error("Identity token issuer does not equal `{expected}`.")]
	Issuer {
		/// Configured issuer.
		expected: String,
	},
	/// `aud` claim does not contain the configured client identifier.
	#[error("Identity token audience does not contain `{client_id}`.")]
	Audience {
		/// Configured client identifier.
		client_id: String,
	},
	/// `exp` claim is in the past (beyond the skew tolerance).
	#[error("Identity token has expired.")]
	Expired,
	/// `iat` claim is implausibly far in the future.
	#[error("Identity token is issued in the future.")]
	IssuedInFuture,
	/// Token carries no `nonce` claim to bind against the request phase.
	#[error("Identity token is missing the nonce claim.")]
	MissingNonce,
	/// `nonce` claim does not match the value from the request phase.
	#[error("Identity token nonce does not match the stored nonce.")]
	Replay,
}
