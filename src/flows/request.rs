//! Request phase: building the authorization redirect and persisting its bindings.
//!
//! Every invocation generates a fresh state/nonce pair; nothing about a previous
//! attempt survives into the next one. The state and nonce are stored in the
//! caller's session before the redirect URL is returned, so a callback can never
//! arrive for values that were not persisted first.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
// self
use crate::{
	_prelude::*,
	flows::Strategy,
	http::StrategyHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, PhaseKind, PhaseOutcome, PhaseSpan},
	session::{SessionKey, SessionStore},
};

/// Redirect artifact produced by the request phase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Fully-formed authorization URL the end user should be redirected to.
	pub redirect_url: Url,
	/// State value bound to this attempt; already persisted in the session.
	pub state: String,
	/// Nonce value bound to this attempt; already persisted in the session.
	pub nonce: String,
}

impl<C, M> Strategy<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the request phase: discovers metadata, binds a fresh state/nonce pair to
	/// the session, and returns the authorization redirect.
	pub async fn request_phase(&self, session: &dyn SessionStore) -> Result<AuthorizationRequest> {
		const KIND: PhaseKind = PhaseKind::Request;

		let span = PhaseSpan::new(KIND, "request_phase");

		obs::record_phase_outcome(KIND, PhaseOutcome::Attempt);

		let result = span
			.instrument(async move {
				let request = self.authorization_request().await?;

				session.set(SessionKey::State, request.state.clone()).await.map_err(Error::from)?;
				session.set(SessionKey::Nonce, request.nonce.clone()).await.map_err(Error::from)?;

				Ok(request)
			})
			.await;

		match &result {
			Ok(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Failure),
		}

		result
	}

	/// Builds the authorization redirect without touching any session.
	///
	/// The query carries exactly `client_id`, `nonce`, `redirect_uri`,
	/// `response_type`, `scope`, and `state`.
	pub async fn authorization_request(&self) -> Result<AuthorizationRequest> {
		let client_id = self.options.client_id()?.to_owned();
		let redirect_uri = self.options.redirect_uri()?.to_owned();
		let metadata = self.resolve_metadata().await?;
		let state = random_token();
		let nonce = random_token();
		let mut redirect_url = metadata.authorization_endpoint.clone();

		{
			let mut pairs = redirect_url.query_pairs_mut();

			pairs.append_pair("client_id", &client_id);
			pairs.append_pair("nonce", &nonce);
			pairs.append_pair("redirect_uri", &redirect_uri);
			pairs.append_pair("response_type", &self.options.response_type);
			pairs.append_pair("scope", &self.options.scope.normalized());
			pairs.append_pair("state", &state);
		}

		Ok(AuthorizationRequest { redirect_url, state, nonce })
	}
}

fn random_token() -> String {
	URL_SAFE_NO_PAD.encode(rand::rng().random::<[u8; 32]>())
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn random_tokens_are_distinct_and_url_safe() {
		let tokens = (0..64).map(|_| random_token()).collect::<HashSet<_>>();

		assert_eq!(tokens.len(), 64);

		for token in &tokens {
			assert!(
				token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
				"Token must be URL-safe without padding: {token}."
			);
		}
	}
}
