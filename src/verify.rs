//! Identity token verification.
//!
//! Checks run in a fixed order and the first failure aborts the callback: header
//! decode and algorithm screening, key lookup, signature, issuer, audience,
//! temporal claims, then the nonce binding. Claims are only readable after the
//! whole pipeline passes.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{
	Algorithm, DecodingKey, Validation, decode, decode_header,
	errors::ErrorKind,
	jwk::{Jwk, JwkSet, KeyAlgorithm},
};
use subtle::ConstantTimeEq;
// self
use crate::{_prelude::*, error::VerificationError};

/// Claims of a verified identity token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
	/// Issuer the token was minted by.
	pub iss: String,
	/// Stable subject identifier; becomes the auth-hash `uid`.
	pub sub: String,
	/// Intended audience; must contain the configured client identifier.
	pub aud: Audience,
	/// Expiry as seconds since the Unix epoch.
	pub exp: i64,
	/// Issue instant as seconds since the Unix epoch.
	#[serde(default)]
	pub iat: Option<i64>,
	/// Nonce echoed back from the authorization request.
	#[serde(default)]
	pub nonce: Option<String>,
	/// Email claim, when released.
	#[serde(default)]
	pub email: Option<String>,
	/// Display-name claim, when released.
	#[serde(default)]
	pub name: Option<String>,
}

/// The `aud` claim, which providers serialize as a string or an array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
	/// Single-audience form.
	Single(String),
	/// Multi-audience form.
	Multiple(Vec<String>),
}
impl Audience {
	/// Returns true if the audience names the given client identifier.
	pub fn contains(&self, client_id: &str) -> bool {
		match self {
			Audience::Single(aud) => aud == client_id,
			Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
		}
	}
}

/// Verifies an identity token against the published key set and flow bindings.
///
/// `expected_nonce` is the single-use value stored during the request phase;
/// `clock_skew` is the tolerance applied to `exp` and the forward `iat` check.
pub fn verify_id_token(
	id_token: &str,
	jwks: &JwkSet,
	issuer: &str,
	client_id: &str,
	expected_nonce: &str,
	clock_skew: Duration,
) -> Result<IdTokenClaims, VerificationError> {
	let header = decode_header(id_token).map_err(|source| {
		// The JWT layer rejects `"alg": "none"` as an unknown variant; surface it as
		// the dedicated unsigned case instead of a generic decode failure.
		if header_declares_none(id_token) {
			VerificationError::Unsigned
		} else if matches!(source.kind(), ErrorKind::InvalidAlgorithmName) {
			VerificationError::Unsigned
		} else {
			VerificationError::Malformed { source }
		}
	})?;
	let jwk = find_key(jwks, header.kid.as_deref())?;

	if let Some(key_algorithm) = jwk.common.key_algorithm
		&& !key_algorithm_matches(key_algorithm, header.alg)
	{
		return Err(VerificationError::AlgorithmMismatch {
			key: format!("{key_algorithm:?}"),
			token: format!("{:?}", header.alg),
		});
	}

	let key = DecodingKey::from_jwk(jwk).map_err(|source| VerificationError::InvalidKey { source })?;
	let leeway = u64::try_from(clock_skew.whole_seconds()).unwrap_or_default();
	let mut validation = Validation::new(header.alg);

	validation.set_issuer(&[issuer]);
	validation.set_audience(&[client_id]);
	validation.leeway = leeway;

	let claims = decode::<IdTokenClaims>(id_token, &key, &validation)
		.map(|data| data.claims)
		.map_err(|source| match source.kind() {
			ErrorKind::InvalidSignature => VerificationError::Signature,
			ErrorKind::InvalidIssuer => VerificationError::Issuer { expected: issuer.into() },
			ErrorKind::InvalidAudience => VerificationError::Audience { client_id: client_id.into() },
			ErrorKind::ExpiredSignature => VerificationError::Expired,
			ErrorKind::ImmatureSignature => VerificationError::IssuedInFuture,
			_ => VerificationError::Malformed { source },
		})?;

	// `iat` is not validated by the JWT layer; reject tokens claiming to be minted
	// further in the future than the skew tolerance.
	if let Some(iat) = claims.iat {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		if iat > now + clock_skew.whole_seconds() {
			return Err(VerificationError::IssuedInFuture);
		}
	}

	let nonce = claims.nonce.as_deref().ok_or(VerificationError::MissingNonce)?;

	if nonce.as_bytes().ct_eq(expected_nonce.as_bytes()).into() {
		Ok(claims)
	} else {
		Err(VerificationError::Replay)
	}
}

fn header_declares_none(token: &str) -> bool {
	let Some(raw) = token.split('.').next() else {
		return false;
	};
	let Ok(bytes) = URL_SAFE_NO_PAD.decode(raw) else {
		return false;
	};
	let Ok(header) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
		return false;
	};

	header
		.get("alg")
		.and_then(serde_json::Value::as_str)
		.is_some_and(|alg| alg.eq_ignore_ascii_case("none"))
}

fn find_key<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, VerificationError> {
	match kid {
		Some(kid) =>
			jwks.find(kid).ok_or_else(|| VerificationError::UnknownKey { kid: kid.into() }),
		// A headerless key reference is only unambiguous with a single published key.
		None => match jwks.keys.as_slice() {
			[only] => Ok(only),
			_ => Err(VerificationError::MissingKeyId),
		},
	}
}

fn key_algorithm_matches(key: KeyAlgorithm, token: Algorithm) -> bool {
	matches!(
		(key, token),
		(KeyAlgorithm::HS256, Algorithm::HS256)
			| (KeyAlgorithm::HS384, Algorithm::HS384)
			| (KeyAlgorithm::HS512, Algorithm::HS512)
			| (KeyAlgorithm::RS256, Algorithm::RS256)
			| (KeyAlgorithm::RS384, Algorithm::RS384)
			| (KeyAlgorithm::RS512, Algorithm::RS512)
			| (KeyAlgorithm::ES256, Algorithm::ES256)
			| (KeyAlgorithm::ES384, Algorithm::ES384)
			| (KeyAlgorithm::PS256, Algorithm::PS256)
			| (KeyAlgorithm::PS384, Algorithm::PS384)
			| (KeyAlgorithm::PS512, Algorithm::PS512)
			| (KeyAlgorithm::EdDSA, Algorithm::EdDSA)
	)
}

#[cfg(test)]
mod tests {
	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::{hs256_jwks_document, sign_hs256_id_token};

	const ISSUER: &str = "https://v1.api.parti.xyz";
	const CLIENT_ID: &str = "client-identifier";
	const NONCE: &str = "nonce-value";
	const KID: &str = "key-1";
	const SECRET: &[u8] = b"symmetric-test-secret";

	fn jwks() -> JwkSet {
		serde_json::from_value(hs256_jwks_document(KID, SECRET)).expect("Key set should parse.")
	}

	fn claims(exp_offset: i64) -> serde_json::Value {
		let now = OffsetDateTime::now_utc().unix_timestamp();

		json!({
			"iss": ISSUER,
			"sub": "subject-1",
			"aud": CLIENT_ID,
			"exp": now + exp_offset,
			"iat": now,
			"nonce": NONCE,
		})
	}

	fn verify(token: &str) -> Result<IdTokenClaims, VerificationError> {
		verify_id_token(token, &jwks(), ISSUER, CLIENT_ID, NONCE, Duration::seconds(60))
	}

	#[test]
	fn valid_token_yields_claims() {
		let token = sign_hs256_id_token(KID, SECRET, &claims(3_600));
		let claims = verify(&token).expect("Valid token should verify.");

		assert_eq!(claims.sub, "subject-1");
		assert_eq!(claims.nonce.as_deref(), Some(NONCE));
	}

	#[test]
	fn audience_arrays_are_accepted() {
		let mut payload = claims(3_600);

		payload["aud"] = json!(["another-audience", CLIENT_ID]);

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(verify(&token).is_ok());
	}

	#[test]
	fn wrong_audience_is_rejected() {
		let mut payload = claims(3_600);

		payload["aud"] = json!("another-audience");

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(matches!(verify(&token), Err(VerificationError::Audience { .. })));
	}

	#[test]
	fn wrong_issuer_is_rejected() {
		let mut payload = claims(3_600);

		payload["iss"] = json!("https://v1.api.parti.xyz/");

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(
			matches!(verify(&token), Err(VerificationError::Issuer { .. })),
			"Issuer comparison must be exact; trailing slashes are not normalized away."
		);
	}

	#[test]
	fn expired_token_is_rejected() {
		let token = sign_hs256_id_token(KID, SECRET, &claims(-120));

		assert!(matches!(verify(&token), Err(VerificationError::Expired)));
	}

	#[test]
	fn expiry_within_skew_is_tolerated() {
		let token = sign_hs256_id_token(KID, SECRET, &claims(-30));

		assert!(verify(&token).is_ok());
	}

	#[test]
	fn future_issued_at_is_rejected() {
		let now = OffsetDateTime::now_utc().unix_timestamp();
		let mut payload = claims(3_600);

		payload["iat"] = json!(now + 3_600);

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(matches!(verify(&token), Err(VerificationError::IssuedInFuture)));
	}

	#[test]
	fn nonce_mismatch_is_a_replay() {
		let mut payload = claims(3_600);

		payload["nonce"] = json!("another-nonce");

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(matches!(verify(&token), Err(VerificationError::Replay)));
	}

	#[test]
	fn missing_nonce_claim_is_rejected() {
		let mut payload = claims(3_600);

		payload.as_object_mut().expect("Claims should be an object.").remove("nonce");

		let token = sign_hs256_id_token(KID, SECRET, &payload);

		assert!(matches!(verify(&token), Err(VerificationError::MissingNonce)));
	}

	#[test]
	fn unknown_key_identifier_is_reported() {
		let token = sign_hs256_id_token("rotated-key", SECRET, &claims(3_600));

		match verify(&token) {
			Err(VerificationError::UnknownKey { kid }) => assert_eq!(kid, "rotated-key"),
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}

	#[test]
	fn missing_kid_is_accepted_only_with_a_single_key() {
		let token = sign_hs256_id_token_without_kid(SECRET, &claims(3_600));

		assert!(verify(&token).is_ok());

		let mut two_keys = jwks();

		two_keys.keys.extend(jwks().keys);

		assert!(matches!(
			verify_id_token(&token, &two_keys, ISSUER, CLIENT_ID, NONCE, Duration::seconds(60)),
			Err(VerificationError::MissingKeyId)
		));
	}

	#[test]
	fn tampered_signature_is_rejected() {
		let token = sign_hs256_id_token(KID, SECRET, &claims(3_600));
		let mut parts = token.split('.').map(str::to_owned).collect::<Vec<_>>();

		parts[2] = URL_SAFE_NO_PAD.encode(b"forged-signature");

		assert!(matches!(verify(&parts.join(".")), Err(VerificationError::Signature)));
	}

	#[test]
	fn unsigned_token_is_rejected() {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims(3_600).to_string().as_bytes());
		let token = format!("{header}.{payload}.");

		assert!(matches!(verify(&token), Err(VerificationError::Unsigned)));
	}

	#[test]
	fn key_algorithm_binding_is_enforced() {
		let mut document = hs256_jwks_document(KID, SECRET);

		document["keys"][0]["alg"] = json!("HS384");

		let jwks: JwkSet = serde_json::from_value(document).expect("Key set should parse.");
		let token = sign_hs256_id_token(KID, SECRET, &claims(3_600));

		assert!(matches!(
			verify_id_token(&token, &jwks, ISSUER, CLIENT_ID, NONCE, Duration::seconds(60)),
			Err(VerificationError::AlgorithmMismatch { .. })
		));
	}

	fn sign_hs256_id_token_without_kid(secret: &[u8], claims: &serde_json::Value) -> String {
		jsonwebtoken::encode(
			&jsonwebtoken::Header::new(Algorithm::HS256),
			claims,
			&jsonwebtoken::EncodingKey::from_secret(secret),
		)
		.expect("Signing a test token should succeed.")
	}
}
