//! The normalized identity record returned to the host application.

// self
use crate::{_prelude::*, oauth::TokenSet, options::StrategyOptions, verify::IdTokenClaims};

/// Terminal artifact of a successful authentication attempt.
///
/// Immutable once projected; the strategy never returns a partially populated
/// hash; any verification failure aborts the callback before projection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthHash {
	/// Verified subject identifier (`sub` claim).
	pub uid: String,
	/// Strategy name the hash was produced by.
	pub provider: String,
	/// Optional profile information.
	pub info: AuthInfo,
	/// Raw credentials issued by the provider.
	pub credentials: Credentials,
}
impl AuthHash {
	/// Projects verified claims and the token-exchange result into an [`AuthHash`].
	///
	/// Pure with respect to its inputs; when `skip_info` is set the profile section
	/// stays empty and no userinfo call is implied.
	pub fn project(claims: &IdTokenClaims, tokens: &TokenSet, options: &StrategyOptions) -> Self {
		let info = if options.skip_info {
			AuthInfo::default()
		} else {
			AuthInfo { email: claims.email.clone(), name: claims.name.clone() }
		};

		Self {
			uid: claims.sub.clone(),
			provider: options.name.clone(),
			info,
			credentials: Credentials {
				access_token: tokens.access_token.clone(),
				id_token: tokens.id_token.clone(),
				token_type: tokens.token_type.clone(),
				expires_in: tokens.expires_in,
			},
		}
	}
}

/// Profile information section of the auth hash.
///
/// Empty on the default path (`skip_info = true`); populated from identity-token
/// claims and, when available, the provider's userinfo endpoint otherwise.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
	/// Email address, when asserted by the provider.
	pub email: Option<String>,
	/// Display name, when asserted by the provider.
	pub name: Option<String>,
}
impl AuthInfo {
	/// Merges userinfo claims over the claim-derived baseline.
	///
	/// Userinfo values win where present; existing fields are kept otherwise.
	pub fn merge_userinfo(&mut self, userinfo: UserinfoClaims) {
		if userinfo.email.is_some() {
			self.email = userinfo.email;
		}
		if userinfo.name.is_some() {
			self.name = userinfo.name;
		}
	}
}

/// Standard claims returned by the userinfo endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserinfoClaims {
	/// Subject identifier; must match the verified token subject.
	pub sub: String,
	/// Email address, when released by the provider.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name, when released by the provider.
	#[serde(default)]
	pub name: Option<String>,
}

/// Raw credentials carried through to the host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Bearer access token issued alongside the identity token.
	pub access_token: String,
	/// The verified identity token, unmodified.
	pub id_token: String,
	/// Token type reported by the provider (typically `bearer`).
	pub token_type: String,
	/// Raw `expires_in` value in seconds, when the provider supplied one.
	pub expires_in: Option<i64>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{options::StrategyOptionsOverrides, verify::Audience};

	fn claims() -> IdTokenClaims {
		IdTokenClaims {
			iss: "https://v1.api.parti.xyz".into(),
			sub: "subject-1".into(),
			aud: Audience::Single("client-identifier".into()),
			exp: 4_102_444_800,
			iat: Some(1_700_000_000),
			nonce: Some("nonce".into()),
			email: Some("user@example.com".into()),
			name: Some("User".into()),
		}
	}

	fn tokens() -> TokenSet {
		TokenSet {
			access_token: "access".into(),
			id_token: "id-token".into(),
			token_type: "bearer".into(),
			expires_in: Some(3600),
		}
	}

	#[test]
	fn skip_info_leaves_profile_empty() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides::default())
			.expect("Default options should resolve.");
		let hash = AuthHash::project(&claims(), &tokens(), &options);

		assert_eq!(hash.uid, "subject-1");
		assert_eq!(hash.provider, "parti");
		assert_eq!(hash.info, AuthInfo::default());
		assert_eq!(hash.credentials.access_token, "access");
		assert_eq!(hash.credentials.id_token, "id-token");
		assert_eq!(hash.credentials.expires_in, Some(3600));
	}

	#[test]
	fn info_projects_claims_when_not_skipped() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides {
			skip_info: Some(false),
			..Default::default()
		})
		.expect("Options with skip_info=false should resolve.");
		let hash = AuthHash::project(&claims(), &tokens(), &options);

		assert_eq!(hash.info.email.as_deref(), Some("user@example.com"));
		assert_eq!(hash.info.name.as_deref(), Some("User"));
	}

	#[test]
	fn userinfo_merge_prefers_fresh_values() {
		let mut info = AuthInfo { email: Some("old@example.com".into()), name: None };

		info.merge_userinfo(UserinfoClaims {
			sub: "subject-1".into(),
			email: Some("new@example.com".into()),
			name: None,
		});

		assert_eq!(info.email.as_deref(), Some("new@example.com"));
		assert_eq!(info.name, None);
	}
}
