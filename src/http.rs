//! Transport primitives for the token-generation call.
//!
//! [`TokenHttpClient`] is the crate's only dependency on an HTTP stack. It hands out
//! [`AsyncHttpClient`] handles (the request/response contract from the `oauth2` crate, built on
//! the `http` types), so any client able to execute an `http::Request<Vec<u8>>` can carry the
//! impersonation exchange. [`TransportErrorMapper`] turns the transport's own failures into
//! crate errors before the failure classifier sees them. Retries, backoff, and timeouts belong
//! to the transport; the impersonation flow issues each call exactly once.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, classify::Stage};
#[cfg(feature = "reqwest")] use crate::error::{ConfigError, TransportError};

/// Abstraction over HTTP transports capable of executing the token-generation call.
///
/// Implementations must be `Send + Sync + 'static` so they can be shared behind `Arc`, and the
/// futures their handles return must be `Send` so refreshes can hop executors.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle used for a single exchange.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle for the next request.
	fn handle(&self) -> Self::Handle;
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(&self, stage: Stage, error: HttpClientError<E>) -> Error;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}
}

/// [`AsyncHttpClient`] handle returned by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, stage: Stage, err: HttpClientError<ReqwestError>) -> Error {
		// Stage reserved for transports that treat endpoints differently.
		let _ = stage;

		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() =>
				ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) =>
				TransportError::network(OtherTransportError(message)).into(),
			_ => TransportError::network(OtherTransportError(
				"unrecognized HTTP client failure".into(),
			))
			.into(),
		}
	}
}

/// Free-form failure reported by an HTTP client without a typed error.
#[derive(Debug, ThisError)]
#[error("HTTP client error: {0}.")]
pub struct OtherTransportError(pub String);

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;

	#[test]
	fn other_transport_errors_become_network_failures() {
		let err = ReqwestTransportErrorMapper.map_transport_error(
			Stage::GenerateAccessToken,
			HttpClientError::Other("connection reset".into()),
		);

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));

		let source =
			StdError::source(&err).expect("Network failures should expose their cause.");

		assert!(source.to_string().contains("connection reset"));
	}

	#[test]
	fn io_errors_keep_their_variant() {
		let err = ReqwestTransportErrorMapper.map_transport_error(
			Stage::GenerateAccessToken,
			HttpClientError::Io(std::io::Error::other("broken pipe")),
		);

		assert!(matches!(err, Error::Transport(TransportError::Io(_))));
	}
}
