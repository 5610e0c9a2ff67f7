// crates.io
use oauth2::http::{HeaderMap, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	classify,
	credentials::ImpersonatedCredentials,
	ext::RequestSignerExt,
	http::{TokenHttpClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C, M> ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds the `Authorization: Bearer <token>` header map for the impersonated principal.
	///
	/// Every call goes through [`refresh`](Self::refresh), so an expired credential is never
	/// handed out.
	pub async fn headers(&self) -> Result<HeaderMap> {
		self.headers_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`headers`](Self::headers) against a caller-supplied clock.
	pub async fn headers_at(&self, now: OffsetDateTime) -> Result<HeaderMap> {
		const KIND: FlowKind = FlowKind::Headers;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = FlowSpan::new(KIND, "headers")
			.instrument(async move {
				let credential = self.valid_credential_at(now).await?;
				let mut headers = HeaderMap::with_capacity(1);

				headers.insert(AUTHORIZATION, credential.access_token.bearer_header()?);

				Ok(headers)
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Refreshes and rejects a credential that is already expired at `now`.
	pub(crate) async fn valid_credential_at(&self, now: OffsetDateTime) -> Result<Credential> {
		let credential = self.refresh_at(now).await?;

		if credential.is_expired_at(now) {
			return Err(Error::InvariantViolation {
				reason: format!(
					"refreshed credential for `{}` expired at {}",
					self.config.target_principal, credential.expires_at
				),
			});
		}

		Ok(credential)
	}

	/// Attaches fresh authorization headers to an outgoing request.
	pub async fn sign<Request, S>(&self, signer: &S, request: Request) -> Result<Request>
	where
		S: ?Sized + RequestSignerExt<Request>,
	{
		let headers = self.headers().await?;

		signer.attach_headers(request, &headers)
	}

	/// Classifies a failed response to a request made with the impersonated token.
	///
	/// Returns a [`ForbiddenResource`](Error::ForbiddenResource) or
	/// [`ResourceNotFound`](Error::ResourceNotFound) error with guidance appended to
	/// `message`, or `None` for statuses the configured classifier does not recognize.
	pub fn check_resource_response(&self, status: u16, message: impl Into<String>) -> Option<Error> {
		const KIND: FlowKind = FlowKind::Resource;

		let _guard = FlowSpan::new(KIND, "check_resource_response").entered();
		let err = classify::resource_failure(self.classifier.as_ref(), status, message);

		if err.is_some() {
			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		}

		err
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::PrincipalId,
		config::ImpersonationConfig,
		error::ErrorKind,
		source::StaticSource,
		store::CredentialStore,
	};

	fn seeded(credential: Credential) -> crate::credentials::ReqwestImpersonatedCredentials {
		let config = ImpersonationConfig::builder(
			PrincipalId::new("target@demo").expect("Principal fixture should be valid."),
		)
		.build()
		.expect("Config fixture should build.");

		crate::credentials::ReqwestImpersonatedCredentials::new(
			config,
			Arc::new(StaticSource::new("source-token")),
		)
		.with_store(Arc::new(CredentialStore::seeded(credential)))
	}

	#[tokio::test]
	async fn headers_use_the_stored_credential() {
		let credentials =
			seeded(Credential::new("impersonated", macros::datetime!(2025-01-01 00:00 UTC)));
		let headers = credentials
			.headers_at(macros::datetime!(2024-12-31 23:59 UTC))
			.await
			.expect("Valid stored credential should produce headers.");
		let value = headers.get(AUTHORIZATION).expect("Authorization header should be present.");

		assert_eq!(value.as_bytes(), b"Bearer impersonated");
		assert!(value.is_sensitive());
		assert_eq!(headers.len(), 1);
	}

	#[test]
	fn resource_statuses_are_annotated() {
		let credentials =
			seeded(Credential::new("impersonated", macros::datetime!(2025-01-01 00:00 UTC)));
		let forbidden = credentials
			.check_resource_response(403, "GET /v1/things failed")
			.expect("403 should be classified.");

		assert_eq!(forbidden.kind(), ErrorKind::ForbiddenResource);
		assert!(forbidden.to_string().ends_with(classify::FORBIDDEN_RESOURCE_HINT));
		assert!(credentials.check_resource_response(429, "slow down").is_none());
	}
}
