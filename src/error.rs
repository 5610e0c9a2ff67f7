//! Crate-level error taxonomy shared by the store, the impersonation flow, and the classifier.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// Classified variants carry a human-readable message (with any guidance already appended)
/// plus the HTTP status that triggered them. The underlying cause, when one exists, stays
/// reachable through [`std::error::Error::source`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The source authority could not produce a token.
	#[error("{message}")]
	SourceUnavailable {
		/// Message prefixed with the source-refresh context.
		message: String,
		/// HTTP status reported by the source failure, when available.
		status: Option<u16>,
		/// Failure raised by the source authority.
		#[source]
		source: Box<Error>,
	},
	/// The source identity lacks the Token Creator role on the target.
	#[error("{message}")]
	PermissionDenied {
		/// Upstream message followed by role guidance.
		message: String,
		/// HTTP status returned by the token-generation endpoint.
		status: Option<u16>,
		/// Underlying failure, when the classification was made from one.
		#[source]
		source: Option<BoxError>,
	},
	/// The source token was minted without a scope the token-generation API accepts.
	#[error("{message}")]
	InsufficientScope {
		/// Upstream message followed by scope guidance.
		message: String,
		/// HTTP status returned by the token-generation endpoint.
		status: Option<u16>,
		/// Underlying failure, when the classification was made from one.
		#[source]
		source: Option<BoxError>,
	},
	/// Any other token-generation failure.
	#[error("{message}")]
	ImpersonationFailed {
		/// Message prefixed with the impersonation context.
		message: String,
		/// HTTP status returned by the token-generation endpoint, when available.
		status: Option<u16>,
		/// Underlying transport, parse, or API failure.
		#[source]
		source: Option<BoxError>,
	},
	/// A request made as the impersonated principal was rejected with 403.
	#[error("{message}")]
	ForbiddenResource {
		/// Original message with the forbidden-resource hint appended.
		message: String,
		/// HTTP status of the rejected request.
		status: Option<u16>,
	},
	/// A request made as the impersonated principal returned 404.
	#[error("{message}")]
	ResourceNotFound {
		/// Original message with the not-found hint appended.
		message: String,
		/// HTTP status of the rejected request.
		status: Option<u16>,
	},
	/// Credential state is inconsistent; never retried.
	#[error("Credential state invariant violated: {reason}.")]
	InvariantViolation {
		/// Description of the broken invariant.
		reason: String,
	},
}
impl Error {
	/// Returns the taxonomy bucket for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Config,
			Self::Transport(_) => ErrorKind::Transport,
			Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
			Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
			Self::InsufficientScope { .. } => ErrorKind::InsufficientScope,
			Self::ImpersonationFailed { .. } => ErrorKind::ImpersonationFailed,
			Self::ForbiddenResource { .. } => ErrorKind::ForbiddenResource,
			Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
			Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
		}
	}

	/// HTTP status associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::SourceUnavailable { status, .. }
			| Self::PermissionDenied { status, .. }
			| Self::InsufficientScope { status, .. }
			| Self::ImpersonationFailed { status, .. }
			| Self::ForbiddenResource { status, .. }
			| Self::ResourceNotFound { status, .. } => *status,
			Self::Config(_) | Self::Transport(_) | Self::InvariantViolation { .. } => None,
		}
	}
}

/// Flat classification of [`Error`] variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// See [`Error::Config`].
	Config,
	/// See [`Error::Transport`].
	Transport,
	/// See [`Error::SourceUnavailable`].
	SourceUnavailable,
	/// See [`Error::PermissionDenied`].
	PermissionDenied,
	/// See [`Error::InsufficientScope`].
	InsufficientScope,
	/// See [`Error::ImpersonationFailed`].
	ImpersonationFailed,
	/// See [`Error::ForbiddenResource`].
	ForbiddenResource,
	/// See [`Error::ResourceNotFound`].
	ResourceNotFound,
	/// See [`Error::InvariantViolation`].
	InvariantViolation,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Config => "config",
			Self::Transport => "transport",
			Self::SourceUnavailable => "source_unavailable",
			Self::PermissionDenied => "permission_denied",
			Self::InsufficientScope => "insufficient_scope",
			Self::ImpersonationFailed => "impersonation_failed",
			Self::ForbiddenResource => "forbidden_resource",
			Self::ResourceNotFound => "resource_not_found",
			Self::InvariantViolation => "invariant_violation",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Request body could not be encoded.
	#[error("Token-generation request body could not be encoded.")]
	RequestEncode(#[source] serde_json::Error),
	/// A header value contains characters HTTP does not allow.
	#[error("Header value is not valid HTTP.")]
	InvalidHeaderValue(#[from] oauth2::http::header::InvalidHeaderValue),
	/// Endpoint or derived URL cannot be parsed.
	#[error("Endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint uses plain HTTP against a non-loopback host.
	#[error("The token-generation endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Lifetime is not a whole number of seconds within `(0, 3600]`.
	#[error("Token lifetime must be a whole number of seconds in (0, 3600], got {lifetime}.")]
	InvalidLifetime {
		/// Rejected lifetime.
		lifetime: Duration,
	},
	/// Target principal cannot be embedded in the token-generation resource path.
	#[error("Target principal `{principal}` contains a reserved URL character.")]
	InvalidTargetPrincipal {
		/// Rejected principal.
		principal: String,
	},
	/// Principal identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token-generation endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token-generation endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn source_unavailable_exposes_wrapped_cause() {
		let inner = Error::InvariantViolation { reason: "source store is empty".into() };
		let err = Error::SourceUnavailable {
			message: format!("unable to refresh source credential: {inner}"),
			status: None,
			source: Box::new(inner),
		};

		assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
		assert!(err.to_string().starts_with("unable to refresh source credential: "));

		let source = StdError::source(&err).expect("Source failure should be exposed as the cause.");

		assert!(source.to_string().contains("source store is empty"));
	}

	#[test]
	fn status_is_only_reported_for_classified_variants() {
		let denied =
			Error::PermissionDenied { message: "denied".into(), status: Some(403), source: None };
		let config: Error =
			ConfigError::InvalidLifetime { lifetime: Duration::seconds(7200) }.into();

		assert_eq!(denied.status(), Some(403));
		assert_eq!(config.status(), None);
		assert_eq!(config.kind(), ErrorKind::Config);
		assert_eq!(ErrorKind::ResourceNotFound.to_string(), "resource_not_found");
	}
}
