//! Demonstrates plugging a custom transport and transport-error mapper into the impersonation
//! flow; the transport here answers from memory instead of the network.

// std
use std::{future::Future, pin::Pin, sync::Arc};
// crates.io
use color_eyre::Result;
// self
use impersonation_broker::{
	auth::PrincipalId,
	classify::Stage,
	config::ImpersonationConfig,
	credentials::ImpersonatedCredentials,
	error::{Error, TransportError},
	http::{TokenHttpClient, TransportErrorMapper},
	oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse, http::StatusCode},
	source::StaticSource,
};

#[derive(Clone, Default)]
struct InMemoryHttpClient;
impl TokenHttpClient for InMemoryHttpClient {
	type Handle = InMemoryHandle;
	type TransportError = std::io::Error;

	fn handle(&self) -> Self::Handle {
		InMemoryHandle
	}
}

struct InMemoryHandle;
impl<'c> AsyncHttpClient<'c> for InMemoryHandle {
	type Error = HttpClientError<std::io::Error>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			println!("Intercepted {} {}.", request.method(), request.uri());

			let body = br#"{"accessToken":"in-memory-token","expireTime":"2099-01-01T00:00:00Z"}"#;
			let mut response = HttpResponse::new(body.to_vec());

			*response.status_mut() = StatusCode::OK;

			Ok(response)
		})
	}
}

#[derive(Default)]
struct IoErrorMapper;
impl TransportErrorMapper<std::io::Error> for IoErrorMapper {
	fn map_transport_error(&self, stage: Stage, error: HttpClientError<std::io::Error>) -> Error {
		match error {
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransportError::network(std::io::Error::other(format!("{stage}: {other}")))
				.into(),
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let target = PrincipalId::new("batch@demo-project.iam.gserviceaccount.com")?;
	let config = ImpersonationConfig::builder(target).build()?;
	let credentials: ImpersonatedCredentials<InMemoryHttpClient, IoErrorMapper> =
		ImpersonatedCredentials::with_http_client(
			config,
			Arc::new(StaticSource::new("source-token")),
			InMemoryHttpClient,
			IoErrorMapper,
		);
	let credential = credentials.refresh().await?;

	println!("Impersonated token expires at {}.", credential.expires_at);

	Ok(())
}
