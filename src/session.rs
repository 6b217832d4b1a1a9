//! Session capability contract for the state/nonce values crossing the
//! request/callback boundary.
//!
//! The host owns the real session mechanics; the strategy only needs a narrow
//! key-value surface over two well-known keys. Values are single-use:
//! [`SessionStore::take`] removes the entry as it reads it, which is what makes a
//! replayed callback fail instead of producing a second auth hash.

pub mod memory;

pub use memory::MemorySession;

// self
use crate::_prelude::*;

/// Boxed future returned by [`SessionStore`] operations.
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SessionError>> + 'a + Send>>;

/// Well-known session keys owned by this strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionKey {
	/// CSRF-binding state token.
	State,
	/// Replay-binding nonce.
	Nonce,
}
impl SessionKey {
	/// Returns the fixed session key name.
	pub const fn as_str(self) -> &'static str {
		match self {
			SessionKey::State => "omniauth.state",
			SessionKey::Nonce => "omniauth.nonce",
		}
	}
}
impl Display for SessionKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Narrow session contract implemented by host adapters.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Stores a value under the given key, replacing any previous entry.
	fn set(&self, key: SessionKey, value: String) -> SessionFuture<'_, ()>;

	/// Reads the value stored under the given key, if present.
	fn get(&self, key: SessionKey) -> SessionFuture<'_, Option<String>>;

	/// Removes and returns the value stored under the given key.
	fn take(&self, key: SessionKey) -> SessionFuture<'_, Option<String>>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionError {
	/// Backend-level failure of the host's session engine.
	#[error("Session backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use std::error::Error as StdError;

	#[test]
	fn session_keys_use_fixed_names() {
		assert_eq!(SessionKey::State.as_str(), "omniauth.state");
		assert_eq!(SessionKey::Nonce.as_str(), "omniauth.nonce");
	}

	#[test]
	fn session_error_converts_into_strategy_error_with_source() {
		let session_error = SessionError::Backend { message: "session engine offline".into() };
		let strategy_error: Error = session_error.clone().into();

		assert!(matches!(strategy_error, Error::Session(_)));
		assert!(strategy_error.to_string().contains("session engine offline"));

		let source = StdError::source(&strategy_error)
			.expect("Strategy error should expose the original session error as its source.");

		assert_eq!(source.to_string(), session_error.to_string());
	}
}
