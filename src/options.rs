//! Strategy options and the explicit override-merge resolver.

// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

/// Default strategy name, also used as the `provider` field of the auth hash.
pub const DEFAULT_NAME: &str = "parti";
/// Default issuer the strategy authenticates against.
pub const DEFAULT_ISSUER: &str = "https://v1.api.parti.xyz";
/// Default scope set requested during authorization.
pub const DEFAULT_SCOPE: [&str; 2] = ["email", "openid"];
/// The only supported response type; the strategy implements the Authorization Code flow.
pub const RESPONSE_TYPE_CODE: &str = "code";

const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(60);

/// Preferred client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}

/// Relying-party client registration values.
///
/// All fields are caller-supplied; the resolver leaves them empty by default and the
/// request phase fails with a [`ConfigError`] when identifier or redirect URI are
/// still missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
	/// OAuth client identifier issued by the provider.
	pub identifier: Option<String>,
	/// Confidential client secret.
	pub secret: Option<String>,
	/// Redirect URI registered with the provider.
	///
	/// Kept as the caller's exact string; URL normalization could otherwise alter
	/// the value sent to the provider (trailing-slash insertion).
	pub redirect_uri: Option<String>,
}

/// Immutable, fully resolved strategy options.
///
/// Built once via [`StrategyOptions::resolve`]; there is no runtime mutation after
/// construction. The issuer is a validated URL kept in string form because issuer
/// comparison (discovery document and `iss` claim) is exact string equality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOptions {
	/// Strategy name reported in the auth hash.
	pub name: String,
	/// Issuer URL the provider metadata is discovered from.
	pub issuer: String,
	/// Whether provider metadata is discovered; always true.
	pub discovery: bool,
	/// Normalized scope set; always contains `openid`.
	pub scope: ScopeSet,
	/// OAuth response type; fixed to `code`.
	pub response_type: String,
	/// Suppresses the separate userinfo fetch when true (the default).
	pub skip_info: bool,
	/// Client registration values.
	pub client_options: ClientOptions,
	/// How client credentials are presented to the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Clock-skew tolerance applied to `exp`/`iat` checks.
	pub clock_skew: Duration,
	/// Re-fetch the JWKS once when a token references an unknown key identifier.
	pub jwks_rotation_refresh: bool,
}
impl StrategyOptions {
	/// Merges caller overrides onto the documented defaults.
	///
	/// Any key present in the override replaces the default at that key, recursively
	/// for `client_options`. Malformed shapes (invalid issuer URL, invalid scope
	/// entries, unsupported response type, disabled discovery) are fatal here.
	pub fn resolve(overrides: StrategyOptionsOverrides) -> Result<Self, ConfigError> {
		let issuer = overrides.issuer.unwrap_or_else(|| DEFAULT_ISSUER.into());

		Url::parse(&issuer)
			.map_err(|source| ConfigError::InvalidIssuer { issuer: issuer.clone(), source })?;

		if overrides.discovery == Some(false) {
			return Err(ConfigError::DiscoveryRequired);
		}

		let response_type = overrides.response_type.unwrap_or_else(|| RESPONSE_TYPE_CODE.into());

		if response_type != RESPONSE_TYPE_CODE {
			return Err(ConfigError::UnsupportedResponseType { requested: response_type });
		}

		let scope = match overrides.scope {
			Some(values) => ScopeSet::with_openid(values)?,
			None => ScopeSet::with_openid(DEFAULT_SCOPE)?,
		};
		let client_options = ClientOptions {
			identifier: overrides.client_options.identifier,
			secret: overrides.client_options.secret,
			redirect_uri: overrides.client_options.redirect_uri,
		};

		if let Some(redirect) = client_options.redirect_uri.as_deref() {
			Url::parse(redirect).map_err(|source| ConfigError::InvalidRedirect { source })?;
		}

		Ok(Self {
			name: overrides.name.unwrap_or_else(|| DEFAULT_NAME.into()),
			issuer,
			discovery: true,
			scope,
			response_type,
			skip_info: overrides.skip_info.unwrap_or(true),
			client_options,
			client_auth_method: overrides.client_auth_method.unwrap_or_default(),
			clock_skew: overrides.clock_skew.unwrap_or(DEFAULT_CLOCK_SKEW),
			jwks_rotation_refresh: overrides.jwks_rotation_refresh.unwrap_or(true),
		})
	}

	/// Returns the client identifier or fails when unset.
	pub fn client_id(&self) -> Result<&str, ConfigError> {
		self.client_options.identifier.as_deref().ok_or(ConfigError::MissingClientId)
	}

	/// Returns the registered redirect URI or fails when unset.
	pub fn redirect_uri(&self) -> Result<&str, ConfigError> {
		self.client_options.redirect_uri.as_deref().ok_or(ConfigError::MissingRedirectUri)
	}
}
/// Caller-supplied option overrides, merged by [`StrategyOptions::resolve`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyOptionsOverrides {
	/// Overrides the strategy name.
	pub name: Option<String>,
	/// Overrides the issuer URL.
	pub issuer: Option<String>,
	/// Overrides the discovery flag; only `true` is accepted.
	pub discovery: Option<bool>,
	/// Overrides the scope set; `openid` is re-added when omitted.
	pub scope: Option<Vec<String>>,
	/// Overrides the response type; only `code` is accepted.
	pub response_type: Option<String>,
	/// Overrides the userinfo suppression flag.
	pub skip_info: Option<bool>,
	/// Overrides individual client registration fields.
	pub client_options: ClientOptionsOverrides,
	/// Overrides the client authentication method.
	pub client_auth_method: Option<ClientAuthMethod>,
	/// Overrides the clock-skew tolerance.
	pub clock_skew: Option<Duration>,
	/// Overrides the JWKS rotation-refresh policy.
	pub jwks_rotation_refresh: Option<bool>,
}

/// Nested overrides for [`ClientOptions`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptionsOverrides {
	/// Overrides the client identifier.
	pub identifier: Option<String>,
	/// Overrides the client secret.
	pub secret: Option<String>,
	/// Overrides the redirect URI.
	pub redirect_uri: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides::default())
			.expect("Default options should resolve.");

		assert_eq!(options.name, "parti");
		assert_eq!(options.issuer, "https://v1.api.parti.xyz");
		assert!(options.discovery);
		assert_eq!(options.scope.iter().collect::<Vec<_>>(), vec!["email", "openid"]);
		assert_eq!(options.response_type, "code");
		assert!(options.skip_info);
		assert_eq!(options.client_options.identifier, None);
		assert_eq!(options.client_options.secret, None);
		assert_eq!(options.client_options.redirect_uri, None);
		assert_eq!(options.clock_skew, Duration::seconds(60));
		assert!(options.jwks_rotation_refresh);
	}

	#[test]
	fn overrides_replace_only_specified_keys() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides {
			issuer: Some("http://another-issuer.com".into()),
			client_options: ClientOptionsOverrides {
				identifier: Some("client-identifier".into()),
				..Default::default()
			},
			..Default::default()
		})
		.expect("Partial overrides should resolve.");

		assert_eq!(options.issuer, "http://another-issuer.com");
		assert_eq!(options.client_options.identifier.as_deref(), Some("client-identifier"));
		assert_eq!(options.client_options.secret, None);
		assert_eq!(options.name, "parti");
		assert!(options.skip_info);
	}

	#[test]
	fn scope_always_contains_openid() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides {
			scope: Some(vec!["profile".into(), "profile".into()]),
			..Default::default()
		})
		.expect("Scope override should resolve.");

		assert_eq!(options.scope.iter().collect::<Vec<_>>(), vec!["openid", "profile"]);
	}

	#[test]
	fn malformed_overrides_fail_at_construction() {
		assert!(matches!(
			StrategyOptions::resolve(StrategyOptionsOverrides {
				issuer: Some("not a url".into()),
				..Default::default()
			}),
			Err(ConfigError::InvalidIssuer { .. })
		));
		assert!(matches!(
			StrategyOptions::resolve(StrategyOptionsOverrides {
				scope: Some(vec!["".into()]),
				..Default::default()
			}),
			Err(ConfigError::InvalidScope(_))
		));
		assert!(matches!(
			StrategyOptions::resolve(StrategyOptionsOverrides {
				response_type: Some("id_token".into()),
				..Default::default()
			}),
			Err(ConfigError::UnsupportedResponseType { .. })
		));
		assert!(matches!(
			StrategyOptions::resolve(StrategyOptionsOverrides {
				discovery: Some(false),
				..Default::default()
			}),
			Err(ConfigError::DiscoveryRequired)
		));
	}

	#[test]
	fn missing_client_fields_surface_as_config_errors() {
		let options = StrategyOptions::resolve(StrategyOptionsOverrides::default())
			.expect("Default options should resolve.");

		assert!(matches!(options.client_id(), Err(ConfigError::MissingClientId)));
		assert!(matches!(options.redirect_uri(), Err(ConfigError::MissingRedirectUri)));
	}
}
