// crates.io
use oauth2::{
	AsyncHttpClient, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Method,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credential},
	classify::{self, FailureContext, Stage},
	credentials::{GenerateAccessTokenRequest, GenerateAccessTokenResponse, ImpersonatedCredentials},
	error::ConfigError,
	http::{TokenHttpClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const JSON: &str = "application/json";

impl<C, M> ImpersonatedCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns a credential valid right now, exchanging the source token when the stored one
	/// is missing or expired.
	pub async fn refresh(&self) -> Result<Credential> {
		self.refresh_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`refresh`](Self::refresh) against a caller-supplied clock.
	///
	/// On failure the store keeps whatever it held before the call.
	pub async fn refresh_at(&self, now: OffsetDateTime) -> Result<Credential> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.refresh_metrics.record_attempt();

				if let Some(credential) = self.store.valid_at(now) {
					obs::record_decision(KIND, "reuse", "valid");
					self.refresh_metrics.record_reuse();

					return Ok(credential);
				}

				let _singleflight = self.refresh_guard.lock().await;

				// Another caller may have finished an exchange while this one waited.
				if let Some(credential) = self.store.valid_at(now) {
					obs::record_decision(KIND, "reuse_after_wait", "valid");
					self.refresh_metrics.record_reuse();

					return Ok(credential);
				}

				obs::record_decision(KIND, "exchange", self.store.expiry_at(now).as_str());

				match self.exchange().await {
					Ok(credential) => {
						self.store.set(credential.clone());
						self.refresh_metrics.record_exchange();

						Ok(credential)
					},
					Err(err) => {
						self.refresh_metrics.record_failure();

						Err(err)
					},
				}
			})
			.await;

		obs::record_flow_result(KIND, &result);

		result
	}

	/// Drops the stored credential so the next call performs a fresh exchange.
	pub fn invalidate(&self) -> Option<Credential> {
		self.store.clear()
	}

	async fn exchange(&self) -> Result<Credential> {
		let source_token = self.source.access_token().await.map_err(classify::source_failure)?;
		let request = self.build_request(&source_token)?;
		let handle = self.http_client.handle();
		let response = match handle.call(request).await {
			Ok(response) => response,
			Err(err) => {
				let cause =
					self.transport_mapper.map_transport_error(Stage::GenerateAccessToken, err);

				// Local misconfiguration is reported as is.
				if matches!(cause, Error::Config(_)) {
					return Err(cause);
				}

				return Err(classify::exchange_failure(
					self.classifier.as_ref(),
					&FailureContext::network_failure(Stage::GenerateAccessToken),
					self.config.target_principal.as_str(),
					Some(cause),
				));
			},
		};

		self.parse_response(response)
	}

	fn build_request(&self, source_token: &AccessToken) -> Result<HttpRequest> {
		let url = self.config.generate_access_token_url()?;
		let body = serde_json::to_vec(&GenerateAccessTokenRequest::from(&self.config))
			.map_err(ConfigError::RequestEncode)?;
		let request = oauth2::http::Request::builder()
			.method(Method::POST)
			.uri(url.as_str())
			.header(CONTENT_TYPE, HeaderValue::from_static(JSON))
			.header(ACCEPT, HeaderValue::from_static(JSON))
			.header(AUTHORIZATION, source_token.bearer_header()?)
			.body(body)
			.map_err(ConfigError::from)?;

		Ok(request)
	}

	fn parse_response(&self, response: HttpResponse) -> Result<Credential> {
		let target = self.config.target_principal.as_str();
		let status = response.status();

		if !status.is_success() {
			let ctx = FailureContext::from_response(
				Stage::GenerateAccessToken,
				status.as_u16(),
				response.body(),
			);

			return Err(classify::exchange_failure(self.classifier.as_ref(), &ctx, target, None));
		}

		let status = status.as_u16();
		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let parsed: GenerateAccessTokenResponse =
			serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
				classify::malformed_response(
					target,
					status,
					"token-generation response is malformed",
					Some(Box::new(err)),
				)
			})?;

		if parsed.access_token.is_empty() {
			return Err(classify::malformed_response(
				target,
				status,
				"token-generation response carries an empty access token",
				None,
			));
		}

		let expires_at = parsed.expires_at().map_err(|err| {
			classify::malformed_response(
				target,
				status,
				"token-generation response carries an invalid expireTime",
				Some(Box::new(err)),
			)
		})?;

		Ok(Credential { access_token: parsed.access_token, expires_at })
	}
}
