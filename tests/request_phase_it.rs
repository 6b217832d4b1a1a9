#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oidc_strategy::{
	_preludet::*,
	options::{ClientOptionsOverrides, StrategyOptions, StrategyOptionsOverrides},
	serde_json::json,
	session::{SessionKey, SessionStore},
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";
const REDIRECT_URI: &str = "http://redirect-uri.com";
const KID: &str = "it-key";
const SECRET: &[u8] = b"integration-test-secret";

fn options(server: &MockServer) -> StrategyOptions {
	StrategyOptions::resolve(StrategyOptionsOverrides {
		issuer: Some(server.base_url()),
		client_options: ClientOptionsOverrides {
			identifier: Some(CLIENT_ID.into()),
			secret: Some(CLIENT_SECRET.into()),
			redirect_uri: Some(REDIRECT_URI.into()),
		},
		..Default::default()
	})
	.expect("Test options should resolve.")
}

async fn mount_discovery(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
	let issuer = server.base_url();
	let discovery = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"issuer": issuer,
				"authorization_endpoint": format!("{issuer}/oauth/authorization"),
				"token_endpoint": format!("{issuer}/oauth/token"),
				"jwks_uri": format!("{issuer}/oauth/discovery/keys"),
			}));
		})
		.await;
	let jwks = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/discovery/keys");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(hs256_jwks_document(KID, SECRET));
		})
		.await;

	(discovery, jwks)
}

#[tokio::test]
async fn request_phase_builds_the_exact_authorization_redirect() {
	let server = MockServer::start_async().await;
	let (discovery, jwks) = mount_discovery(&server).await;
	let (strategy, session) = build_reqwest_test_strategy(options(&server));
	let request =
		strategy.request_phase(session.as_ref()).await.expect("Request phase should succeed.");

	discovery.assert_async().await;
	jwks.assert_async().await;

	assert_eq!(request.redirect_url.path(), "/oauth/authorization");
	assert_eq!(
		request.redirect_url.host_str(),
		Url::parse(&server.base_url()).expect("Server URL should parse.").host_str()
	);

	let pairs: HashMap<_, _> = request.redirect_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.len(), 6, "The redirect carries exactly the six documented parameters.");
	assert_eq!(pairs.get("client_id"), Some(&CLIENT_ID.into()));
	assert_eq!(pairs.get("redirect_uri"), Some(&REDIRECT_URI.into()));
	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("scope"), Some(&"email openid".into()));
	assert_eq!(pairs.get("state"), Some(&request.state));
	assert_eq!(pairs.get("nonce"), Some(&request.nonce));
}

#[tokio::test]
async fn request_phase_persists_state_and_nonce_before_returning() {
	let server = MockServer::start_async().await;
	let _mocks = mount_discovery(&server).await;
	let (strategy, session) = build_reqwest_test_strategy(options(&server));
	let request =
		strategy.request_phase(session.as_ref()).await.expect("Request phase should succeed.");

	assert_eq!(
		session.get(SessionKey::State).await.expect("Session get should succeed."),
		Some(request.state.clone())
	);
	assert_eq!(
		session.get(SessionKey::Nonce).await.expect("Session get should succeed."),
		Some(request.nonce.clone())
	);
}

#[tokio::test]
async fn each_invocation_generates_fresh_bindings() {
	let server = MockServer::start_async().await;
	let (discovery, jwks) = mount_discovery(&server).await;
	let (strategy, session) = build_reqwest_test_strategy(options(&server));
	let first =
		strategy.request_phase(session.as_ref()).await.expect("First request should succeed.");
	let second =
		strategy.request_phase(session.as_ref()).await.expect("Second request should succeed.");

	assert_ne!(first.state, second.state);
	assert_ne!(first.nonce, second.nonce);
	assert_eq!(
		session.get(SessionKey::State).await.expect("Session get should succeed."),
		Some(second.state.clone()),
		"A new attempt replaces the previous bindings."
	);

	discovery.assert_calls_async(1).await;
	jwks.assert_calls_async(1).await;
}

#[tokio::test]
async fn missing_client_configuration_fails_before_any_network_call() {
	let server = MockServer::start_async().await;
	let (discovery, _jwks) = mount_discovery(&server).await;
	let options = StrategyOptions::resolve(StrategyOptionsOverrides {
		issuer: Some(server.base_url()),
		..Default::default()
	})
	.expect("Options without client fields should still resolve.");
	let (strategy, session) = build_reqwest_test_strategy(options);
	let err = strategy
		.request_phase(session.as_ref())
		.await
		.expect_err("Request phase must fail without a client identifier.");

	assert!(matches!(err, Error::Config(_)));

	discovery.assert_calls_async(0).await;

	assert_eq!(
		session.get(SessionKey::State).await.expect("Session get should succeed."),
		None,
		"Nothing may be persisted when the phase fails."
	);
}
