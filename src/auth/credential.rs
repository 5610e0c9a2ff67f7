//! Access token secret, credential pair, and expiry classification.

// crates.io
use oauth2::http::HeaderValue;
// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted access token wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a new token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns true when the token carries no characters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Renders a sensitive `Bearer <token>` header value.
	pub fn bearer_header(&self) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.0))?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access token paired with the absolute instant it stops being valid.
///
/// The two fields only ever change together: stores replace whole credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Bearer token issued for the target principal.
	pub access_token: AccessToken,
	/// Absolute expiry reported by the token-generation endpoint.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Pairs a token with its expiry.
	pub fn new(access_token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { access_token: AccessToken::new(access_token), expires_at }
	}

	/// Returns `true` once `instant` reaches the expiry (no skew margin).
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Time left before expiry; negative once expired.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		self.expires_at - instant
	}

	/// Classifies the credential at `instant`.
	pub fn expiry_at(&self, instant: OffsetDateTime) -> ExpiryState {
		if self.is_expired_at(instant) {
			ExpiryState::Expired(self.expires_at)
		} else {
			ExpiryState::Valid(self.expires_at)
		}
	}
}

/// Expiry state of a credential slot relative to a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpiryState {
	/// No credential has been fetched yet.
	Unset,
	/// A credential exists but expired at the carried instant.
	Expired(OffsetDateTime),
	/// A credential exists and stays valid until the carried instant.
	Valid(OffsetDateTime),
}
impl ExpiryState {
	/// Classifies an optional credential at `instant`.
	pub fn of(credential: Option<&Credential>, instant: OffsetDateTime) -> Self {
		credential.map_or(Self::Unset, |credential| credential.expiry_at(instant))
	}

	/// Returns `true` when a refresh is required before the slot can be used.
	pub fn is_expiring(self) -> bool {
		!matches!(self, Self::Valid(_))
	}

	/// Expiry instant, if a credential was ever stored.
	pub fn expires_at(self) -> Option<OffsetDateTime> {
		match self {
			Self::Unset => None,
			Self::Expired(at) | Self::Valid(at) => Some(at),
		}
	}

	/// Returns a stable label suitable for span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unset => "unset",
			Self::Expired(_) => "expired",
			Self::Valid(_) => "valid",
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn token_formatters_redact() {
		let token = AccessToken::new("super-secret");

		assert_eq!(format!("{token:?}"), "AccessToken(\"<redacted>\")");
		assert_eq!(format!("{token}"), "<redacted>");
		assert!(!format!("{:?}", Credential::new("super-secret", OffsetDateTime::UNIX_EPOCH))
			.contains("super-secret"));
	}

	#[test]
	fn bearer_header_is_marked_sensitive() {
		let header = AccessToken::new("tok123")
			.bearer_header()
			.expect("Plain ASCII tokens should form a valid header.");

		assert_eq!(header.to_str().expect("Header should be ASCII."), "Bearer tok123");
		assert!(header.is_sensitive());
		assert!(AccessToken::new("bad\ntoken").bearer_header().is_err());
	}

	#[test]
	fn expiry_states_cover_all_transitions() {
		let expires = macros::datetime!(2025-01-01 01:00 UTC);
		let credential = Credential::new("access", expires);

		assert_eq!(ExpiryState::of(None, expires), ExpiryState::Unset);
		assert_eq!(
			ExpiryState::of(Some(&credential), macros::datetime!(2025-01-01 00:59:59 UTC)),
			ExpiryState::Valid(expires)
		);
		assert_eq!(credential.expiry_at(expires), ExpiryState::Expired(expires));
		assert!(ExpiryState::Unset.is_expiring());
		assert!(ExpiryState::Expired(expires).is_expiring());
		assert!(!ExpiryState::Valid(expires).is_expiring());
		assert_eq!(ExpiryState::Unset.expires_at(), None);
		assert_eq!(
			credential.remaining_at(macros::datetime!(2025-01-01 00:30 UTC)),
			Duration::minutes(30)
		);
	}
}
