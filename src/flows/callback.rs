//! Callback phase: validation, code exchange, token verification, and projection.
//!
//! The checks run in a fixed order and the first failure aborts the attempt:
//! state binding, provider error, code presence, nonce retrieval, exchange, then
//! identity token verification. Both session values are consumed up front, so a
//! replayed callback fails the state check regardless of how far the original
//! attempt progressed.

// crates.io
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{AuthHash, UserinfoClaims},
	error::{CallbackError, CsrfError, VerificationError},
	flows::Strategy,
	http::StrategyHttpClient,
	oauth::{EndpointKind, ExchangeFacade, TransportErrorMapper},
	obs::{self, PhaseKind, PhaseOutcome, PhaseSpan},
	session::{SessionKey, SessionStore},
	verify::{IdTokenClaims, verify_id_token},
};

/// Query parameters delivered to the callback endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
	/// Authorization code issued by the provider.
	pub code: Option<String>,
	/// State value echoed back by the provider.
	pub state: Option<String>,
	/// OAuth error code, when the provider denied the request.
	pub error: Option<String>,
	/// Optional human-readable error description.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Parses the callback query string; unrecognized parameters are ignored.
	pub fn from_query(query: &str) -> Self {
		let mut params = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			match &*key {
				"code" => params.code = Some(value.into_owned()),
				"state" => params.state = Some(value.into_owned()),
				"error" => params.error = Some(value.into_owned()),
				"error_description" => params.error_description = Some(value.into_owned()),
				_ => {},
			}
		}

		params
	}
}

impl<C, M> Strategy<C, M>
where
	C: ?Sized + StrategyHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Runs the callback phase and returns the projected auth hash.
	pub async fn callback_phase(
		&self,
		session: &dyn SessionStore,
		params: &CallbackParams,
	) -> Result<AuthHash> {
		const KIND: PhaseKind = PhaseKind::Callback;

		let span = PhaseSpan::new(KIND, "callback_phase");

		obs::record_phase_outcome(KIND, PhaseOutcome::Attempt);

		let result = span.instrument(self.run_callback(session, params)).await;

		match &result {
			Ok(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Success),
			Err(_) => obs::record_phase_outcome(KIND, PhaseOutcome::Failure),
		}

		result
	}

	async fn run_callback(
		&self,
		session: &dyn SessionStore,
		params: &CallbackParams,
	) -> Result<AuthHash> {
		// The stored state is consumed before any other work, which is what makes a
		// replayed callback fail here instead of reaching the provider again.
		let stored_state = session
			.take(SessionKey::State)
			.await
			.map_err(Error::from)?
			.ok_or(CsrfError::MissingSessionState)?;
		let inbound_state =
			params.state.as_deref().ok_or(CsrfError::MissingStateParameter)?;

		if !bool::from(inbound_state.as_bytes().ct_eq(stored_state.as_bytes())) {
			return Err(CsrfError::StateMismatch.into());
		}
		if let Some(error) = &params.error {
			return Err(CallbackError::Provider {
				error: error.clone(),
				error_description: params.error_description.clone(),
			}
			.into());
		}

		let code = params.code.as_deref().ok_or(CallbackError::MissingCode)?;
		let nonce = session
			.take(SessionKey::Nonce)
			.await
			.map_err(Error::from)?
			.ok_or(CallbackError::MissingNonce)?;
		let metadata = self.resolve_metadata().await?;
		let facade = ExchangeFacade::from_metadata(
			&self.options,
			&metadata,
			self.http_client.clone(),
			self.transport_mapper.clone(),
		)?;
		let tokens = facade.exchange_code(code).await?;
		let claims = self.verify_with_rotation(&tokens.id_token, &metadata.jwks, &nonce).await?;
		let mut hash = AuthHash::project(&claims, &tokens, &self.options);

		if !self.options.skip_info
			&& let Some(userinfo_endpoint) = &metadata.userinfo_endpoint
		{
			let userinfo =
				self.fetch_userinfo(userinfo_endpoint.as_str(), &tokens.access_token).await?;

			if userinfo.sub != claims.sub {
				return Err(CallbackError::Userinfo { status: None }.into());
			}

			hash.info.merge_userinfo(userinfo);
		}

		Ok(hash)
	}

	/// Verifies the identity token, refreshing the key set once on an unknown `kid`.
	async fn verify_with_rotation(
		&self,
		id_token: &str,
		jwks: &jsonwebtoken::jwk::JwkSet,
		nonce: &str,
	) -> Result<IdTokenClaims> {
		let issuer = self.options.issuer.as_str();
		let client_id = self.options.client_id()?;
		let skew = self.options.clock_skew;

		match verify_id_token(id_token, jwks, issuer, client_id, nonce, skew) {
			Err(VerificationError::UnknownKey { .. }) if self.options.jwks_rotation_refresh => {
				let refreshed = self.refresh_keys().await?;

				verify_id_token(id_token, &refreshed.jwks, issuer, client_id, nonce, skew)
					.map_err(Error::from)
			},
			other => other.map_err(Error::from),
		}
	}

	async fn fetch_userinfo(&self, url: &str, access_token: &str) -> Result<UserinfoClaims> {
		let bytes = self.fetch_json(EndpointKind::Userinfo, url, Some(access_token)).await?;

		serde_json::from_slice(&bytes)
			.map_err(|_| CallbackError::Userinfo { status: None }.into())
	}
}
