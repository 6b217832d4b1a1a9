//! OpenID Connect Relying Party strategy - discovery-driven authorization code flow,
//! replay-proof callbacks, and verified identity tokens in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod discovery;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod options;
pub mod session;
pub mod verify;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use jsonwebtoken::{Algorithm, EncodingKey, Header};
	// self
	#[cfg(feature = "reqwest")]
	use crate::{
		flows::Strategy,
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		options::StrategyOptions,
		session::MemorySession,
	};

	#[cfg(feature = "reqwest")]
	/// Strategy type alias used by reqwest-backed integration tests.
	pub type ReqwestTestStrategy = Strategy<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	#[cfg(feature = "reqwest")]
	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	#[cfg(feature = "reqwest")]
	/// Constructs a [`Strategy`] backed by an in-memory session and the reqwest transport used
	/// across integration tests.
	pub fn build_reqwest_test_strategy(
		options: StrategyOptions,
	) -> (ReqwestTestStrategy, Arc<MemorySession>) {
		let session = Arc::new(MemorySession::default());
		let strategy = Strategy::with_http_client(
			options,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		);

		(strategy, session)
	}

	/// JWKS document containing a single symmetric `oct` key, so integration tests can mint
	/// verifiable identity tokens without provisioning an asymmetric keypair.
	pub fn hs256_jwks_document(kid: &str, secret: &[u8]) -> serde_json::Value {
		serde_json::json!({
			"keys": [{
				"kty": "oct",
				"kid": kid,
				"alg": "HS256",
				"k": URL_SAFE_NO_PAD.encode(secret),
			}]
		})
	}

	/// Signs an identity token with the symmetric key published by [`hs256_jwks_document`].
	pub fn sign_hs256_id_token(kid: &str, secret: &[u8], claims: &serde_json::Value) -> String {
		let header = Header { kid: Some(kid.to_owned()), ..Header::new(Algorithm::HS256) };

		jsonwebtoken::encode(&header, claims, &EncodingKey::from_secret(secret))
			.expect("Failed to sign test identity token.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {httpmock as _, tokio as _};
// The self dev-dependency exists so integration tests see the `test` feature; the lib
// test target links it too and must acknowledge it.
#[cfg(test)] use oidc_strategy as _;
