//! Impersonated credentials: the refresh engine and the header provider.
//!
//! [`ImpersonatedCredentials`] owns the impersonation settings, the source authority, the
//! transport, and a shared [`CredentialStore`]. [`refresh`](ImpersonatedCredentials::refresh)
//! reuses the stored credential until it expires and otherwise exchanges the source token for
//! a new one; [`headers`](ImpersonatedCredentials::headers) always goes through that check
//! before it builds an `Authorization` header.
//!
//! # Concurrency
//!
//! The check-then-refresh sequence runs behind a single-flight guard. When several callers
//! find the credential expiring at once, one performs the exchange and the others wait, then
//! re-check the store and reuse the fresh credential. The store itself replaces the token and
//! its expiry together, so readers never see a mismatched pair.

mod headers;
mod metrics;
mod refresh;
mod wire;

pub use metrics::RefreshMetrics;
pub use wire::{GenerateAccessTokenRequest, GenerateAccessTokenResponse};

// self
use crate::{
	_prelude::*,
	classify::{DefaultFailureClassifier, FailureClassifier},
	config::ImpersonationConfig,
	http::{TokenHttpClient, TransportErrorMapper},
	source::{SourceAuthority, SourceFuture},
	store::CredentialStore,
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Credentials specialized for the crate's default reqwest transport stack.
#[cfg(feature = "reqwest")]
pub type ReqwestImpersonatedCredentials =
	ImpersonatedCredentials<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Impersonated identity backed by a source authority.
pub struct ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Target, scopes, delegates, lifetime, and endpoint.
	pub config: ImpersonationConfig,
	/// Delegating identity whose token authorizes each exchange.
	pub source: Arc<dyn SourceAuthority>,
	/// HTTP client wrapper used for the token-generation call.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before classification.
	pub transport_mapper: Arc<M>,
	/// Classifier deciding which error kind a failure maps to.
	pub classifier: Arc<dyn FailureClassifier>,
	/// Store holding the current credential.
	pub store: Arc<CredentialStore>,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh_guard: Arc<AsyncMutex<()>>,
}
impl<C, M> ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates credentials that reuse the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: ImpersonationConfig,
		source: Arc<dyn SourceAuthority>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config,
			source,
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			classifier: Arc::new(DefaultFailureClassifier),
			store: Default::default(),
			refresh_metrics: Default::default(),
			refresh_guard: Default::default(),
		}
	}

	/// Replaces the credential store, e.g. to share it or to seed a known credential.
	pub fn with_store(mut self, store: Arc<CredentialStore>) -> Self {
		self.store = store;

		self
	}

	/// Returns `true` when the next [`refresh`](Self::refresh) would perform an exchange.
	pub fn is_expiring(&self) -> bool {
		self.store.is_expiring()
	}

	/// Replaces the failure classifier.
	pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
		self.classifier = classifier;

		self
	}
}
#[cfg(feature = "reqwest")]
impl ImpersonatedCredentials<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates credentials that provision their own reqwest-backed transport.
	pub fn new(config: ImpersonationConfig, source: Arc<dyn SourceAuthority>) -> Self {
		Self::with_http_client(
			config,
			source,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			source: Arc::clone(&self.source),
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			classifier: Arc::clone(&self.classifier),
			store: Arc::clone(&self.store),
			refresh_metrics: Arc::clone(&self.refresh_metrics),
			refresh_guard: Arc::clone(&self.refresh_guard),
		}
	}
}
impl<C, M> Debug for ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ImpersonatedCredentials")
			.field("config", &self.config)
			.field("credential_set", &self.store.current().is_some())
			.finish()
	}
}
/// Impersonated credentials can themselves act as the source of a further impersonation.
impl<C, M> SourceAuthority for ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn access_token(&self) -> SourceFuture<'_> {
		Box::pin(async move {
			let now = OffsetDateTime::now_utc();

			Ok(self.valid_credential_at(now).await?.access_token)
		})
	}
}
