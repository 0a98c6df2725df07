//! Strongly typed identifiers for the two halves of a cache key.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (principal, registration).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (principal, registration).
		kind: &'static str,
	},
	/// The identifier contains the key-segment delimiter.
	#[error("{kind} identifier contains a colon.")]
	ContainsDelimiter {
		/// Kind of identifier (principal, registration).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (principal, registration).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { PrincipalId, "Identifier of the authenticated principal that owns a token record.", "Principal" }
def_id! { RegistrationId, "Identifier of the downstream client registration a token was issued for.", "Registration" }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	// Colons delimit segments inside store and lock keys.
	if view.contains(':') {
		return Err(IdentifierError::ContainsDelimiter { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_validate_shape() {
		assert!(PrincipalId::new("").is_err());
		assert!(PrincipalId::new("with space").is_err());
		assert!(PrincipalId::new("with:colon").is_err());
		assert!(RegistrationId::new("\tclient").is_err());

		let principal =
			PrincipalId::new("alice@corp").expect("Principal fixture should be considered valid.");

		assert_eq!(principal.as_ref(), "alice@corp");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let principal: PrincipalId = serde_json::from_str("\"user-42\"")
			.expect("Principal should deserialize successfully.");

		assert_eq!(principal.as_ref(), "user-42");
		assert!(serde_json::from_str::<PrincipalId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<RegistrationId>("\"a:b\"").is_err());
	}

	#[test]
	fn length_limit_is_inclusive() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		RegistrationId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(matches!(
			RegistrationId::new(&too_long),
			Err(IdentifierError::TooLong { .. })
		));
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<RegistrationId, u8> = HashMap::from_iter([(
			RegistrationId::new("gitlab").expect("Registration used for lookup should be valid."),
			3_u8,
		)]);

		assert_eq!(map.get("gitlab"), Some(&3));
	}
}
