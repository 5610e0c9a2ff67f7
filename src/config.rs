//! Impersonation settings: who to impersonate, through which delegates, with what scopes and
//! lifetime, against which token-generation endpoint.
//!
//! # Delegation precondition
//!
//! When `delegates` is non-empty the remote service requires an unbroken grant chain: the
//! source identity must hold the Token Creator role on `delegates[0]`, each `delegates[i]` on
//! `delegates[i + 1]`, and the last delegate (or the source itself when the chain is empty)
//! on the target principal. The chain cannot be verified locally; a broken link surfaces as
//! [`Error::PermissionDenied`](crate::error::Error::PermissionDenied).

// self
use crate::{
	_prelude::*,
	auth::{PrincipalId, ScopeSet},
	error::ConfigError,
};

/// Default IAM Credentials endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://iamcredentials.googleapis.com";
/// Default and maximum token lifetime.
pub const MAX_LIFETIME: Duration = Duration::seconds(3600);

const RESERVED_PATH_CHARS: [char; 3] = ['/', '?', '#'];

/// Validated impersonation settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImpersonationConfig {
	/// Identity whose token is produced.
	pub target_principal: PrincipalId,
	/// Scopes requested for the impersonated token.
	pub scopes: ScopeSet,
	/// Ordered delegation chain, passed through to the remote service verbatim.
	pub delegates: Vec<PrincipalId>,
	/// Requested token lifetime, whole seconds in `(0, 3600]`.
	pub lifetime: Duration,
	/// Base URL of the token-generation service.
	pub endpoint: Url,
}
impl ImpersonationConfig {
	/// Starts a builder for the provided target principal.
	pub fn builder(target_principal: PrincipalId) -> ImpersonationConfigBuilder {
		ImpersonationConfigBuilder::new(target_principal)
	}

	/// Resource path of the token-generation call, relative to `{endpoint}/v1/`.
	pub fn resource_path(&self) -> String {
		format!("projects/-/serviceAccounts/{}:generateAccessToken", self.target_principal)
	}

	/// Absolute URL of the token-generation call.
	pub fn generate_access_token_url(&self) -> Result<Url, ConfigError> {
		let base = self.endpoint.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}/v1/{}", self.resource_path()))
			.map_err(|source| ConfigError::InvalidEndpoint { source })
	}

	/// Lifetime rendered the way the token-generation API expects it (`"3600s"`).
	pub fn lifetime_param(&self) -> String {
		format!("{}s", self.lifetime.whole_seconds())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.target_principal.contains(RESERVED_PATH_CHARS) {
			return Err(ConfigError::InvalidTargetPrincipal {
				principal: self.target_principal.to_string(),
			});
		}

		validate_lifetime(self.lifetime)?;
		validate_endpoint(&self.endpoint)?;

		Ok(())
	}
}

/// Builder for [`ImpersonationConfig`] values.
#[derive(Debug)]
pub struct ImpersonationConfigBuilder {
	target_principal: PrincipalId,
	scopes: ScopeSet,
	delegates: Vec<PrincipalId>,
	lifetime: Duration,
	endpoint: Option<Url>,
}
impl ImpersonationConfigBuilder {
	fn new(target_principal: PrincipalId) -> Self {
		Self {
			target_principal,
			scopes: ScopeSet::default(),
			delegates: Vec::new(),
			lifetime: MAX_LIFETIME,
			endpoint: None,
		}
	}

	/// Sets the scopes requested for the impersonated token (default: none).
	pub fn scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = scopes;

		self
	}

	/// Appends a single delegate to the chain.
	pub fn delegate(mut self, delegate: PrincipalId) -> Self {
		self.delegates.push(delegate);

		self
	}

	/// Replaces the delegation chain (default: empty).
	pub fn delegates<I>(mut self, delegates: I) -> Self
	where
		I: IntoIterator<Item = PrincipalId>,
	{
		self.delegates = delegates.into_iter().collect();

		self
	}

	/// Overrides the token lifetime (default: 3600 seconds).
	pub fn lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Overrides the token-generation endpoint (default: [`DEFAULT_ENDPOINT`]).
	pub fn endpoint(mut self, endpoint: Url) -> Self {
		self.endpoint = Some(endpoint);

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<ImpersonationConfig, ConfigError> {
		let endpoint = match self.endpoint {
			Some(endpoint) => endpoint,
			None => Url::parse(DEFAULT_ENDPOINT)
				.map_err(|source| ConfigError::InvalidEndpoint { source })?,
		};
		let config = ImpersonationConfig {
			target_principal: self.target_principal,
			scopes: self.scopes,
			delegates: self.delegates,
			lifetime: self.lifetime,
			endpoint,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_lifetime(lifetime: Duration) -> Result<(), ConfigError> {
	if lifetime <= Duration::ZERO || lifetime > MAX_LIFETIME || lifetime.subsec_nanoseconds() != 0
	{
		Err(ConfigError::InvalidLifetime { lifetime })
	} else {
		Ok(())
	}
}

fn validate_endpoint(url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ConfigError::InsecureEndpoint { url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn principal(value: &str) -> PrincipalId {
		PrincipalId::new(value).expect("Principal fixture should be valid.")
	}

	#[test]
	fn defaults_match_the_public_service() {
		let config = ImpersonationConfig::builder(principal("sa@demo.iam.gserviceaccount.com"))
			.build()
			.expect("Default config should build.");

		assert!(config.scopes.is_empty());
		assert!(config.delegates.is_empty());
		assert_eq!(config.lifetime_param(), "3600s");
		assert_eq!(
			config
				.generate_access_token_url()
				.expect("Default URL should be derivable.")
				.as_str(),
			"https://iamcredentials.googleapis.com/v1/projects/-/serviceAccounts/sa@demo.iam.gserviceaccount.com:generateAccessToken"
		);
	}

	#[test]
	fn lifetime_must_be_whole_seconds_in_range() {
		let build = |lifetime| {
			ImpersonationConfig::builder(principal("sa@demo"))
				.lifetime(lifetime)
				.build()
		};

		assert!(build(Duration::seconds(1)).is_ok());
		assert!(build(MAX_LIFETIME).is_ok());
		assert!(matches!(build(Duration::ZERO), Err(ConfigError::InvalidLifetime { .. })));
		assert!(matches!(build(Duration::seconds(3601)), Err(ConfigError::InvalidLifetime { .. })));
		assert!(matches!(
			build(Duration::milliseconds(1500)),
			Err(ConfigError::InvalidLifetime { .. })
		));
	}

	#[test]
	fn endpoint_requires_https_except_loopback() {
		let build = |endpoint: &str| {
			ImpersonationConfig::builder(principal("sa@demo"))
				.endpoint(Url::parse(endpoint).expect("Endpoint fixture should parse."))
				.build()
		};

		assert!(build("http://127.0.0.1:8080").is_ok());
		assert!(build("http://localhost:8080/").is_ok());
		assert!(matches!(
			build("http://iamcredentials.example.com"),
			Err(ConfigError::InsecureEndpoint { .. })
		));

		let config = build("http://127.0.0.1:8080/").expect("Loopback endpoint should build.");

		assert_eq!(
			config.generate_access_token_url().expect("URL should be derivable.").path(),
			"/v1/projects/-/serviceAccounts/sa@demo:generateAccessToken"
		);
	}

	#[test]
	fn target_cannot_escape_the_resource_path() {
		let err = ImpersonationConfig::builder(principal("../other?x"))
			.build()
			.expect_err("Reserved characters must be rejected in the target.");

		assert!(matches!(err, ConfigError::InvalidTargetPrincipal { .. }));

		let config = ImpersonationConfig::builder(principal("sa@demo"))
			.delegate(principal("projects/-/serviceAccounts/d1@demo"))
			.build()
			.expect("Delegates may use full resource names.");

		assert_eq!(config.delegates.len(), 1);
	}
}
