//! Thread-safe in-memory [`SessionStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	session::{SessionError, SessionFuture, SessionKey, SessionStore},
};

type SessionMap = Arc<RwLock<HashMap<SessionKey, String>>>;

/// Thread-safe session backend that keeps entries in-process for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemorySession(SessionMap);
impl MemorySession {
	fn set_now(map: SessionMap, key: SessionKey, value: String) -> Result<(), SessionError> {
		map.write().insert(key, value);

		Ok(())
	}

	fn get_now(map: SessionMap, key: SessionKey) -> Option<String> {
		map.read().get(&key).cloned()
	}

	fn take_now(map: SessionMap, key: SessionKey) -> Option<String> {
		map.write().remove(&key)
	}
}
impl SessionStore for MemorySession {
	fn set(&self, key: SessionKey, value: String) -> SessionFuture<'_, ()> {
		let map = self.0.clone();

		Box::pin(async move { Self::set_now(map, key, value) })
	}

	fn get(&self, key: SessionKey) -> SessionFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::get_now(map, key)) })
	}

	fn take(&self, key: SessionKey) -> SessionFuture<'_, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::take_now(map, key)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn take_is_single_use() {
		let session = MemorySession::default();

		session
			.set(SessionKey::State, "state-token".into())
			.await
			.expect("Setting a session value should succeed.");

		assert_eq!(
			session.get(SessionKey::State).await.expect("Get should succeed.").as_deref(),
			Some("state-token")
		);
		assert_eq!(
			session.take(SessionKey::State).await.expect("Take should succeed.").as_deref(),
			Some("state-token")
		);
		assert_eq!(
			session.take(SessionKey::State).await.expect("Second take should succeed."),
			None,
			"Taken values must not be observable twice."
		);
	}

	#[tokio::test]
	async fn keys_are_independent() {
		let session = MemorySession::default();

		session
			.set(SessionKey::State, "state-token".into())
			.await
			.expect("Setting the state should succeed.");
		session
			.set(SessionKey::Nonce, "nonce-token".into())
			.await
			.expect("Setting the nonce should succeed.");

		assert_eq!(
			session.take(SessionKey::State).await.expect("Take should succeed.").as_deref(),
			Some("state-token")
		);
		assert_eq!(
			session.get(SessionKey::Nonce).await.expect("Get should succeed.").as_deref(),
			Some("nonce-token")
		);
	}
}
