//! Request signing contracts that let callers attach impersonated credentials to arbitrary
//! HTTP clients.

// crates.io
use oauth2::http::{HeaderMap, Request as HttpRequest};
// self
use crate::_prelude::*;

/// Describes how to attach authorization headers to an outbound request without constraining
/// the HTTP client type.
pub trait RequestSignerExt<Request>
where
	Self: Send + Sync,
{
	/// Consumes the request and returns it with every header in `headers` set, replacing any
	/// existing value under the same name.
	fn attach_headers(&self, request: Request, headers: &HeaderMap) -> Result<Request>;
}

/// Signer for `http::Request` values.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpRequestSigner;
impl<B> RequestSignerExt<HttpRequest<B>> for HttpRequestSigner {
	fn attach_headers(
		&self,
		mut request: HttpRequest<B>,
		headers: &HeaderMap,
	) -> Result<HttpRequest<B>> {
		for (name, value) in headers {
			request.headers_mut().insert(name.clone(), value.clone());
		}

		Ok(request)
	}
}

/// Signer for `reqwest::RequestBuilder` values.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestRequestSigner;
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder> for ReqwestRequestSigner {
	fn attach_headers(
		&self,
		request: reqwest::RequestBuilder,
		headers: &HeaderMap,
	) -> Result<reqwest::RequestBuilder> {
		Ok(request.headers(headers.clone()))
	}
}
