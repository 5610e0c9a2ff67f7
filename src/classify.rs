//! Failure Classifier: turns raw source, transport, and API failures into actionable errors.
//!
//! The IAM Credentials API reports the two most common misconfigurations with fixed
//! messages on an HTTP 403: [`PERMISSION_DENIED_MESSAGE`] when the source identity lacks the
//! Token Creator role on the target, and [`INSUFFICIENT_SCOPE_MESSAGE`] when the source token
//! was minted without an accepted OAuth scope. [`DefaultFailureClassifier`] matches those
//! strings exactly. They belong to the remote service and may change without notice; when they
//! do, classification degrades to [`ErrorKind::ImpersonationFailed`] with the raw message
//! preserved. All upstream wording lives in this module.
//!
//! Every error built here keeps the original detail and appends guidance after it.

// self
use crate::{_prelude::*, error::ErrorKind};

/// Upstream message for a missing Token Creator role.
pub const PERMISSION_DENIED_MESSAGE: &str = "The caller does not have permission";
/// Upstream message for a source token without an accepted OAuth scope.
pub const INSUFFICIENT_SCOPE_MESSAGE: &str = "Request had insufficient authentication scopes.";
/// Guidance appended to [`ErrorKind::PermissionDenied`] errors.
pub const PERMISSION_DENIED_HINT: &str = "The source credential needs the Service Account Token Creator role (roles/iam.serviceAccountTokenCreator) on the target principal, granted through every delegate in the chain.";
/// Guidance appended to [`ErrorKind::InsufficientScope`] errors.
pub const INSUFFICIENT_SCOPE_HINT: &str = "The source credential was minted without an OAuth scope accepted by the IAM Credentials API; request https://www.googleapis.com/auth/cloud-platform for it.";
/// Hint appended to 403 responses received while acting as the impersonated principal.
pub const FORBIDDEN_RESOURCE_HINT: &str =
	"Impersonated principal is not permitted to access the Target Resource.";
/// Hint appended to 404 responses received while acting as the impersonated principal.
pub const NOT_FOUND_RESOURCE_HINT: &str = "Target Resource was not found.";

const SOURCE_CONTEXT: &str = "unable to refresh source credential";
const IMPERSONATE_CONTEXT: &str = "unable to impersonate";

/// Where a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Token-generation call against the IAM Credentials endpoint.
	GenerateAccessToken,
	/// Request issued with the impersonated token against some other API.
	Resource,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::GenerateAccessToken => "generate_access_token",
			Self::Resource => "resource",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Context handed to a [`FailureClassifier`].
///
/// Holds primitive data only (status code, parsed API error fields, body preview) so
/// classifiers stay independent from any HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureContext {
	/// Stage that failed.
	pub stage: Stage,
	/// HTTP status code, when a response was received.
	pub http_status: Option<u16>,
	/// `error.message` from a Google API error body.
	pub api_message: Option<String>,
	/// `error.status` from a Google API error body (e.g. `PERMISSION_DENIED`).
	pub api_status: Option<String>,
	/// Preview of a body that did not parse as an API error.
	pub body_preview: Option<String>,
	/// Indicates whether the failure happened before any response arrived.
	pub network_error: bool,
}
impl FailureContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an empty context for `stage`.
	pub fn new(stage: Stage) -> Self {
		Self {
			stage,
			http_status: None,
			api_message: None,
			api_status: None,
			body_preview: None,
			network_error: false,
		}
	}

	/// Context for a failure raised by the transport before a response arrived.
	pub fn network_failure(stage: Stage) -> Self {
		let mut ctx = Self::new(stage);

		ctx.network_error = true;

		ctx
	}

	/// Context for a non-success HTTP response; parses the Google API error envelope when
	/// the body carries one and keeps a preview otherwise.
	pub fn from_response(stage: Stage, status: u16, body: &[u8]) -> Self {
		let ctx = Self::new(stage).with_http_status(status);

		match serde_json::from_slice::<ApiErrorEnvelope>(body) {
			Ok(ApiErrorEnvelope { error: ApiErrorBody { message, status: api_status } })
				if message.is_some() || api_status.is_some() =>
				Self { api_message: message, api_status, ..ctx },
			_ if body.is_empty() => ctx,
			_ => ctx.with_body_preview(String::from_utf8_lossy(body)),
		}
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the API error message.
	pub fn with_api_message(mut self, message: impl Into<String>) -> Self {
		self.api_message = Some(message.into());

		self
	}

	/// Adds the API error status string.
	pub fn with_api_status(mut self, status: impl Into<String>) -> Self {
		self.api_status = Some(status.into());

		self
	}

	/// Adds a truncated body preview.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Most specific human-readable detail available.
	pub fn detail(&self) -> Option<String> {
		self.api_message
			.clone()
			.or_else(|| self.body_preview.clone())
			.or_else(|| self.http_status.map(|status| format!("HTTP {status}")))
	}
}

/// Strategy hook that decides which [`ErrorKind`] a failure belongs to.
///
/// Return `None` when the failure is not recognized; callers then fall back to
/// [`ErrorKind::ImpersonationFailed`] for token-generation failures and leave resource
/// failures untouched.
pub trait FailureClassifier: Send + Sync {
	/// Classifies a failure.
	fn classify(&self, ctx: &FailureContext) -> Option<ErrorKind>;
}

/// Classifier that knows the IAM Credentials error messages and the resource status hints.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultFailureClassifier;
impl FailureClassifier for DefaultFailureClassifier {
	fn classify(&self, ctx: &FailureContext) -> Option<ErrorKind> {
		match ctx.stage {
			Stage::GenerateAccessToken => Some(classify_exchange(ctx)),
			Stage::Resource => classify_resource(ctx.http_status),
		}
	}
}

fn classify_exchange(ctx: &FailureContext) -> ErrorKind {
	if ctx.network_error {
		return ErrorKind::ImpersonationFailed;
	}

	match (ctx.http_status, ctx.api_message.as_deref()) {
		(Some(403), Some(PERMISSION_DENIED_MESSAGE)) => ErrorKind::PermissionDenied,
		(Some(403), Some(INSUFFICIENT_SCOPE_MESSAGE)) => ErrorKind::InsufficientScope,
		_ => ErrorKind::ImpersonationFailed,
	}
}

fn classify_resource(status: Option<u16>) -> Option<ErrorKind> {
	match status {
		Some(403) => Some(ErrorKind::ForbiddenResource),
		Some(404) => Some(ErrorKind::ResourceNotFound),
		_ => None,
	}
}

/// Wraps a failure raised by the source authority.
pub fn source_failure(err: Error) -> Error {
	Error::SourceUnavailable {
		message: format!("{SOURCE_CONTEXT}: {err}"),
		status: err.status(),
		source: Box::new(err),
	}
}

/// Builds the error for a failed token-generation call.
///
/// `cause` carries the transport or parse failure when there is one; API failures are fully
/// described by `ctx`.
pub fn exchange_failure(
	classifier: &dyn FailureClassifier,
	ctx: &FailureContext,
	target: &str,
	cause: Option<Error>,
) -> Error {
	let kind = classifier.classify(ctx).unwrap_or(ErrorKind::ImpersonationFailed);
	let status = ctx.http_status;
	let detail = ctx
		.detail()
		.or_else(|| cause.as_ref().map(render_chain))
		.unwrap_or_else(|| "token-generation call failed".into());
	let source = cause.map(|err| Box::new(err) as _);

	match kind {
		ErrorKind::PermissionDenied => Error::PermissionDenied {
			message: format!("{IMPERSONATE_CONTEXT} `{target}`: {detail}. {PERMISSION_DENIED_HINT}"),
			status,
			source,
		},
		ErrorKind::InsufficientScope => Error::InsufficientScope {
			message: format!("{IMPERSONATE_CONTEXT} `{target}`: {detail} {INSUFFICIENT_SCOPE_HINT}"),
			status,
			source,
		},
		_ => Error::ImpersonationFailed {
			message: format!("{IMPERSONATE_CONTEXT} `{target}`: {detail}"),
			status,
			source,
		},
	}
}

/// Builds the error for a successful token-generation status whose body is unusable.
pub(crate) fn malformed_response(
	target: &str,
	status: u16,
	reason: &str,
	source: Option<crate::error::BoxError>,
) -> Error {
	Error::ImpersonationFailed {
		message: format!("{IMPERSONATE_CONTEXT} `{target}`: {reason}"),
		status: Some(status),
		source,
	}
}

/// Maps a failed request made with the impersonated token into
/// [`ErrorKind::ForbiddenResource`] or [`ErrorKind::ResourceNotFound`].
///
/// The hint is appended to `message`, never substituted for it. A message that already carries
/// the hint (for example after the caller retried and re-annotated) is kept as is. Returns
/// `None` when the status is not one the classifier recognizes.
pub fn resource_failure(
	classifier: &dyn FailureClassifier,
	status: u16,
	message: impl Into<String>,
) -> Option<Error> {
	let ctx = FailureContext::new(Stage::Resource).with_http_status(status);
	let message = message.into();

	match classifier.classify(&ctx)? {
		ErrorKind::ForbiddenResource => Some(Error::ForbiddenResource {
			message: append_hint(message, FORBIDDEN_RESOURCE_HINT),
			status: Some(status),
		}),
		ErrorKind::ResourceNotFound => Some(Error::ResourceNotFound {
			message: append_hint(message, NOT_FOUND_RESOURCE_HINT),
			status: Some(status),
		}),
		_ => None,
	}
}

/// Default-classifier shorthand for [`resource_failure`].
pub fn annotate_resource_failure(status: u16, message: impl Into<String>) -> Option<Error> {
	resource_failure(&DefaultFailureClassifier, status, message)
}

fn append_hint(message: String, hint: &str) -> String {
	if message.contains(hint) {
		message
	} else if message.is_empty() {
		hint.to_owned()
	} else {
		format!("{message} {hint}")
	}
}

fn render_chain(err: &Error) -> String {
	let mut rendered = err.to_string();
	let mut next = StdError::source(err);

	while let Some(cause) = next {
		rendered.push_str(": ");
		rendered.push_str(&cause.to_string());

		next = cause.source();
	}

	rendered
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= FailureContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(FailureContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
	error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
	message: Option<String>,
	status: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	const TARGET: &str = "sa@demo.iam.gserviceaccount.com";

	fn api_error(message: &str) -> Vec<u8> {
		serde_json::json!({
			"error": { "code": 403, "message": message, "status": "PERMISSION_DENIED" }
		})
		.to_string()
		.into_bytes()
	}

	#[test]
	fn parses_google_error_envelope() {
		let ctx = FailureContext::from_response(
			Stage::GenerateAccessToken,
			403,
			&api_error(PERMISSION_DENIED_MESSAGE),
		);

		assert_eq!(ctx.http_status, Some(403));
		assert_eq!(ctx.api_message.as_deref(), Some(PERMISSION_DENIED_MESSAGE));
		assert_eq!(ctx.api_status.as_deref(), Some("PERMISSION_DENIED"));
		assert_eq!(ctx.body_preview, None);
	}

	#[test]
	fn non_json_bodies_become_truncated_previews() {
		let body = "x".repeat(400);
		let ctx = FailureContext::from_response(Stage::GenerateAccessToken, 502, body.as_bytes());

		assert_eq!(ctx.api_message, None);
		assert_eq!(
			ctx.body_preview.map(|preview| preview.chars().count()),
			Some(FailureContext::BODY_PREVIEW_LIMIT + 1)
		);
	}

	#[test]
	fn exact_messages_drive_403_classification() {
		let classifier = DefaultFailureClassifier;
		let denied = FailureContext::new(Stage::GenerateAccessToken)
			.with_http_status(403)
			.with_api_message(PERMISSION_DENIED_MESSAGE);
		let scope = FailureContext::new(Stage::GenerateAccessToken)
			.with_http_status(403)
			.with_api_message(INSUFFICIENT_SCOPE_MESSAGE);
		let reworded = FailureContext::new(Stage::GenerateAccessToken)
			.with_http_status(403)
			.with_api_message("The caller does not have permission.");
		let wrong_status = FailureContext::new(Stage::GenerateAccessToken)
			.with_http_status(400)
			.with_api_message(PERMISSION_DENIED_MESSAGE);

		assert_eq!(classifier.classify(&denied), Some(ErrorKind::PermissionDenied));
		assert_eq!(classifier.classify(&scope), Some(ErrorKind::InsufficientScope));
		assert_eq!(classifier.classify(&reworded), Some(ErrorKind::ImpersonationFailed));
		assert_eq!(classifier.classify(&wrong_status), Some(ErrorKind::ImpersonationFailed));
		assert_eq!(
			classifier.classify(&FailureContext::network_failure(Stage::GenerateAccessToken)),
			Some(ErrorKind::ImpersonationFailed)
		);
	}

	#[test]
	fn permission_denied_keeps_upstream_message_and_adds_guidance() {
		let ctx = FailureContext::new(Stage::GenerateAccessToken)
			.with_http_status(403)
			.with_api_message(PERMISSION_DENIED_MESSAGE);
		let err = exchange_failure(&DefaultFailureClassifier, &ctx, TARGET, None);

		assert_eq!(err.kind(), ErrorKind::PermissionDenied);
		assert_eq!(err.status(), Some(403));

		let message = err.to_string();

		assert!(message.starts_with(IMPERSONATE_CONTEXT));
		assert!(message.contains(TARGET));
		assert!(message.contains(PERMISSION_DENIED_MESSAGE));
		assert!(message.contains(PERMISSION_DENIED_HINT));
	}

	#[test]
	fn transport_causes_are_wrapped_with_context() {
		let cause: Error = TransportError::network(std::io::Error::other("dns lookup failed")).into();
		let ctx = FailureContext::network_failure(Stage::GenerateAccessToken);
		let err = exchange_failure(&DefaultFailureClassifier, &ctx, TARGET, Some(cause));

		assert_eq!(err.kind(), ErrorKind::ImpersonationFailed);
		assert!(err.to_string().starts_with("unable to impersonate"));
		assert!(err.to_string().contains("dns lookup failed"));
		assert!(StdError::source(&err).is_some(), "The transport failure must stay reachable.");
	}

	#[test]
	fn classified_403_kinds_keep_the_transport_cause() {
		struct DenyAll(ErrorKind);
		impl FailureClassifier for DenyAll {
			fn classify(&self, _: &FailureContext) -> Option<ErrorKind> {
				Some(self.0)
			}
		}

		for kind in [ErrorKind::PermissionDenied, ErrorKind::InsufficientScope] {
			let cause: Error =
				TransportError::network(std::io::Error::other("connection reset")).into();
			let ctx = FailureContext::network_failure(Stage::GenerateAccessToken);
			let err = exchange_failure(&DenyAll(kind), &ctx, TARGET, Some(cause));

			assert_eq!(err.kind(), kind);
			assert!(err.to_string().contains("connection reset"));

			let source = StdError::source(&err)
				.and_then(|source| source.downcast_ref::<Error>())
				.expect("Classified failures should expose their cause.");

			assert_eq!(source.kind(), ErrorKind::Transport);
		}
	}

	#[test]
	fn source_failures_carry_context_and_cause() {
		let inner = Error::PermissionDenied {
			message: "denied upstream".into(),
			status: Some(403),
			source: None,
		};
		let err = source_failure(inner);

		assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
		assert_eq!(err.status(), Some(403));
		assert_eq!(err.to_string(), "unable to refresh source credential: denied upstream");
	}

	#[test]
	fn resource_hints_append_once() {
		let err = annotate_resource_failure(404, "GET /bucket/object failed: 404 Not Found")
			.expect("404 responses should be classified.");

		assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
		assert_eq!(
			err.to_string(),
			format!("GET /bucket/object failed: 404 Not Found {NOT_FOUND_RESOURCE_HINT}")
		);

		let retried = annotate_resource_failure(404, err.to_string())
			.expect("Retried 404 responses should still be classified.");

		assert_eq!(retried.to_string(), err.to_string());

		let forbidden =
			annotate_resource_failure(403, "").expect("403 responses should be classified.");

		assert_eq!(forbidden.kind(), ErrorKind::ForbiddenResource);
		assert_eq!(forbidden.to_string(), FORBIDDEN_RESOURCE_HINT);
		assert!(annotate_resource_failure(500, "boom").is_none());
	}
}
