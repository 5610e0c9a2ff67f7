//! Validated principal identifiers used for the target and delegate chain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 254;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Principal identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Principal identifier contains whitespace: {value}.")]
	ContainsWhitespace {
		/// Rejected identifier.
		value: String,
	},
	/// The identifier exceeded the allowed length.
	#[error("Principal identifier exceeds {max} bytes.")]
	TooLong {
		/// Maximum permitted length in bytes.
		max: usize,
	},
}

/// Service-account style principal: an email such as
/// `name@project.iam.gserviceaccount.com`, a numeric unique id, or a full
/// `projects/-/serviceAccounts/...` resource name when used as a delegate.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);
impl PrincipalId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Deref for PrincipalId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for PrincipalId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for PrincipalId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<PrincipalId> for String {
	fn from(value: PrincipalId) -> Self {
		value.0
	}
}
impl TryFrom<String> for PrincipalId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Principal({})", self.0)
	}
}
impl Display for PrincipalId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for PrincipalId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { value: view.to_owned() });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
