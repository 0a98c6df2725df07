//! Composite cache key identifying the one authoritative record per principal + client pair.

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, RegistrationId},
};

/// Unique composite key for a token record: one record is authoritative per key at any time.
///
/// The key renders into two external formats: the store key
/// (`{namespace}:{principal}:{registration}`) and the lock key
/// (`{lockNamespace}:{registration}:{principal}`). Both are deterministic so every process
/// racing on the same pair serializes on the same lock.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrincipalClientKey {
	/// Principal that authorized the downstream client.
	pub principal: PrincipalId,
	/// Downstream client registration the tokens belong to.
	pub registration: RegistrationId,
}
impl PrincipalClientKey {
	/// Builds a key for the provided principal and client registration.
	pub fn new(principal: PrincipalId, registration: RegistrationId) -> Self {
		Self { principal, registration }
	}

	/// Renders the store key under the provided namespace.
	pub fn store_key(&self, namespace: &str) -> String {
		format!("{namespace}:{}:{}", self.principal, self.registration)
	}

	/// Renders the refresh-lock key under the provided namespace.
	pub fn lock_key(&self, namespace: &str) -> String {
		format!("{namespace}:{}:{}", self.registration, self.principal)
	}
}
impl Display for PrincipalClientKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.principal, self.registration)
	}
}
