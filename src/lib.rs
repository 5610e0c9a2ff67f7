//! Short-lived impersonated access tokens: delegate from a source identity to a target service
//! account through the IAM Credentials `generateAccessToken` API and hand out authorization
//! headers that refresh themselves before they are used.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ext;
pub mod http;
pub mod obs;
pub mod source;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{PrincipalId, ScopeSet},
		config::ImpersonationConfig,
		credentials::ImpersonatedCredentials,
		http::{ReqwestHttpClient, ReqwestTransportErrorMapper},
		source::{SourceAuthority, StaticSource},
		store::CredentialStore,
	};

	/// Credentials type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCredentials =
		ImpersonatedCredentials<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Target principal used across the test suites.
	pub const TEST_TARGET: &str = "target-sa@demo-project.iam.gserviceaccount.com";

	/// Path of the token-generation call for [`TEST_TARGET`].
	pub const TEST_GENERATE_PATH: &str = "/v1/projects/-/serviceAccounts/target-sa@demo-project.iam.gserviceaccount.com:generateAccessToken";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a config pointing at a local mock endpoint with default scopes/delegates/lifetime.
	pub fn test_config(endpoint: &str) -> ImpersonationConfig {
		let target = PrincipalId::new(TEST_TARGET).expect("Test target principal should be valid.");

		ImpersonationConfig::builder(target)
			.endpoint(Url::parse(endpoint).expect("Mock endpoint should parse successfully."))
			.scopes(ScopeSet::default())
			.build()
			.expect("Test impersonation config should build successfully.")
	}

	/// Constructs reqwest-backed credentials with a fixed source token and returns the shared
	/// store so tests can seed and inspect it.
	pub fn build_reqwest_test_credentials(
		config: ImpersonationConfig,
		source_token: &str,
	) -> (ReqwestTestCredentials, Arc<CredentialStore>) {
		let source: Arc<dyn SourceAuthority> = Arc::new(StaticSource::new(source_token));

		build_reqwest_test_credentials_with_source(config, source)
	}

	/// Same as [`build_reqwest_test_credentials`] but with a caller-supplied source authority.
	pub fn build_reqwest_test_credentials_with_source(
		config: ImpersonationConfig,
		source: Arc<dyn SourceAuthority>,
	) -> (ReqwestTestCredentials, Arc<CredentialStore>) {
		let store = Arc::new(CredentialStore::default());
		let credentials = ReqwestTestCredentials::with_http_client(
			config,
			source,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.with_store(Arc::clone(&store));

		(credentials, store)
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
