//! Source Authority: the delegating identity whose token authorizes each impersonation call.
//!
//! The crate never mints source tokens itself. Anything able to hand out a bearer token for
//! its own identity (a service-account or user credential, a metadata-server client, or another
//! [`ImpersonatedCredentials`](crate::credentials::ImpersonatedCredentials) for chained
//! impersonation) plugs in through [`SourceAuthority`]. Implementations own their refresh
//! policy; the impersonation flow only awaits the result.

// self
use crate::{_prelude::*, auth::AccessToken};

/// Boxed future returned by [`SourceAuthority::access_token`].
pub type SourceFuture<'a> = Pin<Box<dyn Future<Output = Result<AccessToken>> + 'a + Send>>;

/// Capability that yields a bearer token for the source identity.
pub trait SourceAuthority
where
	Self: Send + Sync,
{
	/// Returns a currently valid token, refreshing the source's own credential if needed.
	fn access_token(&self) -> SourceFuture<'_>;
}
impl<T> SourceAuthority for Arc<T>
where
	T: ?Sized + SourceAuthority,
{
	fn access_token(&self) -> SourceFuture<'_> {
		(**self).access_token()
	}
}

/// Source that always yields the same pre-minted token.
#[derive(Clone, Debug)]
pub struct StaticSource(AccessToken);
impl StaticSource {
	/// Wraps a token obtained elsewhere.
	pub fn new(token: impl Into<String>) -> Self {
		Self(AccessToken::new(token))
	}
}
impl SourceAuthority for StaticSource {
	fn access_token(&self) -> SourceFuture<'_> {
		let token = self.0.clone();

		Box::pin(async move { Ok(token) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn static_source_returns_its_token_through_arc() {
		let source: Arc<dyn SourceAuthority> = Arc::new(StaticSource::new("source-token"));
		let token = source.access_token().await.expect("Static sources never fail.");

		assert_eq!(token.expose(), "source-token");
	}
}
