//! Provider metadata discovery and the process-lifetime metadata cache.
//!
//! Metadata is always fetched from `{issuer}/.well-known/openid-configuration`;
//! there is no static-configuration path. A successful fetch is cached per issuer
//! for the process lifetime, and concurrent cold-cache resolutions are collapsed
//! into a single fetch by a per-issuer guard.

// crates.io
use jsonwebtoken::jwk::JwkSet;
// self
use crate::{_prelude::*, error::DiscoveryError};

/// Suffix appended to the issuer to form the discovery URL.
pub const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Returns the discovery URL for an issuer, tolerating a trailing slash.
pub fn well_known_url(issuer: &str) -> String {
	format!("{}{WELL_KNOWN_PATH}", issuer.trim_end_matches('/'))
}

/// Raw discovery document as published by the provider.
///
/// Only the fields the strategy consumes are modeled; unknown fields are ignored.
#[derive(Clone, Debug, Deserialize)]
pub struct DiscoveryDocument {
	/// Issuer the document claims to describe.
	pub issuer: String,
	/// Endpoint the end user is redirected to.
	pub authorization_endpoint: Url,
	/// Endpoint the authorization code is exchanged at.
	pub token_endpoint: Url,
	/// Endpoint the signing keys are published at.
	pub jwks_uri: Url,
	/// Optional endpoint for additional profile claims.
	#[serde(default)]
	pub userinfo_endpoint: Option<Url>,
}
impl DiscoveryDocument {
	/// Parses a discovery document, reporting the JSON path of any shape mismatch.
	pub fn parse(bytes: &[u8], url: &str) -> Result<Self, DiscoveryError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| DiscoveryError::Malformed { url: url.into(), source })
	}

	/// Rejects documents whose `issuer` is not exactly the configured issuer.
	///
	/// Exact string equality; no normalization is applied on either side.
	pub fn verify_issuer(&self, expected: &str) -> Result<(), DiscoveryError> {
		if self.issuer == expected {
			Ok(())
		} else {
			Err(DiscoveryError::IssuerMismatch {
				expected: expected.into(),
				actual: self.issuer.clone(),
			})
		}
	}
}

/// Parses a JWKS document, rejecting empty key sets.
pub fn parse_jwks(bytes: &[u8], url: &str) -> Result<JwkSet, DiscoveryError> {
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);
	let jwks: JwkSet = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| DiscoveryError::Malformed { url: url.into(), source })?;

	if jwks.keys.is_empty() {
		return Err(DiscoveryError::EmptyKeySet);
	}

	Ok(jwks)
}

/// Validated provider metadata with the signing keys already fetched.
#[derive(Clone, Debug)]
pub struct ProviderMetadata {
	/// Issuer the metadata was discovered from.
	pub issuer: String,
	/// Endpoint the end user is redirected to.
	pub authorization_endpoint: Url,
	/// Endpoint the authorization code is exchanged at.
	pub token_endpoint: Url,
	/// Endpoint the signing keys were fetched from.
	pub jwks_uri: Url,
	/// Optional endpoint for additional profile claims.
	pub userinfo_endpoint: Option<Url>,
	/// Published signing keys; non-empty by construction.
	pub jwks: JwkSet,
}
impl ProviderMetadata {
	/// Combines a verified discovery document with its fetched key set.
	pub fn new(document: DiscoveryDocument, jwks: JwkSet) -> Self {
		Self {
			issuer: document.issuer,
			authorization_endpoint: document.authorization_endpoint,
			token_endpoint: document.token_endpoint,
			jwks_uri: document.jwks_uri,
			userinfo_endpoint: document.userinfo_endpoint,
			jwks,
		}
	}
}

/// Process-lifetime cache of resolved provider metadata, keyed by issuer.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
	entries: RwLock<HashMap<String, Arc<ProviderMetadata>>>,
	guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}
impl DiscoveryCache {
	/// Returns the cached metadata for an issuer, if resolved before.
	pub fn get(&self, issuer: &str) -> Option<Arc<ProviderMetadata>> {
		self.entries.read().get(issuer).cloned()
	}

	/// Stores (or replaces) the metadata for an issuer.
	pub fn insert(&self, issuer: &str, metadata: Arc<ProviderMetadata>) {
		self.entries.write().insert(issuer.into(), metadata);
	}

	/// Returns (and creates on demand) the singleflight guard for an issuer.
	pub fn guard(&self, issuer: &str) -> Arc<AsyncMutex<()>> {
		let mut guards = self.guards.lock();

		guards.entry(issuer.into()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn document_json(issuer: &str) -> String {
		serde_json::json!({
			"issuer": issuer,
			"authorization_endpoint": format!("{issuer}/oauth/authorization"),
			"token_endpoint": format!("{issuer}/oauth/token"),
			"jwks_uri": format!("{issuer}/oauth/discovery/keys"),
		})
		.to_string()
	}

	#[test]
	fn well_known_url_tolerates_trailing_slash() {
		assert_eq!(
			well_known_url("https://v1.api.parti.xyz"),
			"https://v1.api.parti.xyz/.well-known/openid-configuration"
		);
		assert_eq!(
			well_known_url("https://v1.api.parti.xyz/"),
			"https://v1.api.parti.xyz/.well-known/openid-configuration"
		);
	}

	#[test]
	fn document_parses_and_checks_issuer() {
		let raw = document_json("https://v1.api.parti.xyz");
		let document = DiscoveryDocument::parse(raw.as_bytes(), "test://discovery")
			.expect("Document should parse.");

		assert!(document.verify_issuer("https://v1.api.parti.xyz").is_ok());
		assert!(matches!(
			document.verify_issuer("https://v1.api.parti.xyz/"),
			Err(DiscoveryError::IssuerMismatch { .. })
		),);
	}

	#[test]
	fn malformed_document_names_the_offending_path() {
		let raw = r#"{"issuer":"https://v1.api.parti.xyz","authorization_endpoint":42}"#;
		let error = DiscoveryDocument::parse(raw.as_bytes(), "test://discovery")
			.expect_err("Malformed document must be rejected.");

		match error {
			DiscoveryError::Malformed { source, .. } =>
				assert_eq!(source.path().to_string(), "authorization_endpoint"),
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn empty_key_set_is_rejected() {
		assert!(matches!(
			parse_jwks(br#"{"keys":[]}"#, "test://jwks"),
			Err(DiscoveryError::EmptyKeySet)
		));
	}

	#[test]
	fn cache_returns_the_same_guard_per_issuer() {
		let cache = DiscoveryCache::default();
		let a = cache.guard("https://v1.api.parti.xyz");
		let b = cache.guard("https://v1.api.parti.xyz");
		let other = cache.guard("http://another-issuer.com");

		assert!(Arc::ptr_eq(&a, &b));
		assert!(!Arc::ptr_eq(&a, &other));
	}
}
