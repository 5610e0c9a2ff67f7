// crates.io
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::AccessToken, config::ImpersonationConfig};

/// JSON body of `POST {endpoint}/v1/projects/-/serviceAccounts/{target}:generateAccessToken`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerateAccessTokenRequest {
	/// Delegation chain, always present (`[]` when empty).
	pub delegates: Vec<String>,
	/// Requested scopes, always present (`[]` when empty).
	pub scope: Vec<String>,
	/// Lifetime in the `"<seconds>s"` form.
	pub lifetime: String,
}
impl From<&ImpersonationConfig> for GenerateAccessTokenRequest {
	fn from(config: &ImpersonationConfig) -> Self {
		Self {
			delegates: config.delegates.iter().map(ToString::to_string).collect(),
			scope: config.scopes.iter().map(ToOwned::to_owned).collect(),
			lifetime: config.lifetime_param(),
		}
	}
}

/// Successful token-generation response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAccessTokenResponse {
	/// Token issued for the target principal.
	pub access_token: AccessToken,
	/// RFC 3339 timestamp at which the token stops being valid.
	pub expire_time: String,
}
impl GenerateAccessTokenResponse {
	/// Parses [`expire_time`](Self::expire_time) into an absolute UTC instant.
	pub fn expires_at(&self) -> Result<OffsetDateTime, time::error::Parse> {
		OffsetDateTime::parse(&self.expire_time, &Rfc3339)
	}
}
impl Debug for GenerateAccessTokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GenerateAccessTokenResponse")
			.field("access_token", &self.access_token)
			.field("expire_time", &self.expire_time)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::auth::{PrincipalId, ScopeSet};

	#[test]
	fn request_keeps_empty_lists() {
		let config = ImpersonationConfig::builder(
			PrincipalId::new("sa@demo").expect("Principal fixture should be valid."),
		)
		.build()
		.expect("Config fixture should build.");
		let body = serde_json::to_value(GenerateAccessTokenRequest::from(&config))
			.expect("Request should serialize.");

		assert_eq!(body, serde_json::json!({ "delegates": [], "scope": [], "lifetime": "3600s" }));
	}

	#[test]
	fn request_preserves_delegate_order() {
		let config = ImpersonationConfig::builder(
			PrincipalId::new("sa@demo").expect("Principal fixture should be valid."),
		)
		.delegate(PrincipalId::new("d2@demo").expect("Delegate fixture should be valid."))
		.delegate(PrincipalId::new("d1@demo").expect("Delegate fixture should be valid."))
		.scopes(ScopeSet::new(["b", "a"]).expect("Scope fixture should be valid."))
		.lifetime(Duration::seconds(600))
		.build()
		.expect("Config fixture should build.");
		let request = GenerateAccessTokenRequest::from(&config);

		assert_eq!(request.delegates, ["d2@demo", "d1@demo"]);
		assert_eq!(request.scope, ["a", "b"]);
		assert_eq!(request.lifetime, "600s");
	}

	#[test]
	fn response_parses_rfc3339_and_redacts_token() {
		let response: GenerateAccessTokenResponse = serde_json::from_str(
			r#"{"accessToken":"ya29.secret","expireTime":"2025-01-01T00:00:00Z"}"#,
		)
		.expect("Response fixture should deserialize.");

		assert_eq!(response.access_token.expose(), "ya29.secret");
		assert_eq!(
			response.expires_at().expect("Expiry should parse."),
			macros::datetime!(2025-01-01 00:00 UTC)
		);
		assert!(!format!("{response:?}").contains("ya29.secret"));

		let fractional: GenerateAccessTokenResponse = serde_json::from_str(
			r#"{"accessToken":"t","expireTime":"2025-01-01T01:00:00.5+01:00"}"#,
		)
		.expect("Response fixture should deserialize.");

		assert_eq!(
			fractional.expires_at().expect("Offset expiry should parse."),
			macros::datetime!(2025-01-01 00:00:00.5 UTC)
		);
	}
}
