//! Failure taxonomy for outbound calls.
//!
//! Every failure a call can run into is first captured as an [`Error`] and then
//! normalized into an [`Envelope`](crate::Envelope). Callers normally never see
//! an `Error` directly; they read the envelope's `error_message` (the error's
//! `Display`), `error_data` and `kind`. Cancellation is deliberately *not* part
//! of this enum, see [`Cancelled`](crate::Cancelled).

use crate::rate_limit::RateLimitInfo;
use crate::response::FailureKind;
use http::{HeaderMap, StatusCode};

/// Message used when a call is issued without a target URL.
pub const MISSING_URL: &str = "URL cannot be null.";

/// Everything that can go wrong while building, sending or decoding a request.
///
/// # Examples
///
/// ```
/// use bracer::{Error, FailureKind};
/// use http::{HeaderMap, StatusCode};
///
/// let err = Error::HttpError {
///     status: StatusCode::SERVICE_UNAVAILABLE,
///     raw_response: "try later".to_string(),
///     headers: HeaderMap::new(),
///     rate_limit_info: None,
/// };
///
/// assert!(err.is_retryable());
/// assert_eq!(err.kind(), FailureKind::Http);
/// assert_eq!(err.raw_response(), Some("try later"));
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Required input was missing or malformed. Detected before any network activity.
    #[error("{0}")]
    Validation(String),

    /// A network-level error occurred (connection refused, DNS lookup failed, etc.).
    ///
    /// Holds the full message chain of the underlying transport error.
    #[error("Network error: {0}")]
    Network(String),

    /// The transport gave up waiting for a response.
    #[error("Request timed out")]
    Timeout,

    /// The response body could not be decoded into the expected type.
    ///
    /// An otherwise successful (2xx) response with an undecodable body ends up here.
    #[error("Failed to deserialize response: {serde_error}")]
    DeserializationFailed {
        /// The raw text that failed to decode
        raw_response: String,
        /// The decoder's error message
        serde_error: String,
        /// The HTTP status of the response, when the text came from one
        status: Option<StatusCode>,
    },

    /// The server answered with a non-2xx status code.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
        /// Throttling hints parsed from the headers, if any were present
        rate_limit_info: Option<RateLimitInfo>,
    },

    /// Invalid configuration, such as a header value that is not valid ASCII.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A transport failure persisted through every allowed attempt.
    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded {
        /// The number of attempts made, including the first one
        attempts: usize,
        /// The failure observed on the final attempt
        last_error: Box<Error>,
    },

    /// The request body could not be encoded.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The target URL could not be parsed or joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this failure is transient.
    ///
    /// Transport failures (network errors and timeouts) are transient, as are
    /// the throttling statuses 429 and 503. Every other HTTP status and every
    /// validation or serialization failure is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::HttpError { status, .. } => is_throttle_status(*status),
            Error::Validation(_)
            | Error::DeserializationFailed { .. }
            | Error::ConfigurationError(_)
            | Error::MaxRetriesExceeded { .. }
            | Error::SerializationFailed(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// The category this failure is reported under in an envelope.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Validation(_) | Error::ConfigurationError(_) | Error::InvalidUrl(_) => {
                FailureKind::Validation
            }
            Error::Network(_) | Error::Timeout => FailureKind::Transport,
            Error::HttpError { .. } => FailureKind::Http,
            Error::SerializationFailed(_) | Error::DeserializationFailed { .. } => {
                FailureKind::Serialization
            }
            Error::MaxRetriesExceeded { last_error, .. } => last_error.kind(),
        }
    }

    /// Returns the HTTP status code if this failure has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => *status,
            Error::MaxRetriesExceeded { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this failure carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            Error::MaxRetriesExceeded { last_error, .. } => last_error.raw_response(),
            _ => None,
        }
    }

    /// Diagnostic detail placed in an envelope's `error_data`.
    ///
    /// Failures that carry a response body report it verbatim; transport
    /// failures report their debug rendering; validation failures report nothing.
    pub fn diagnostic(&self) -> Option<String> {
        if let Some(raw) = self.raw_response() {
            return Some(raw.to_string());
        }
        match self {
            Error::Network(_) | Error::Timeout | Error::MaxRetriesExceeded { .. } => {
                Some(format!("{:?}", self))
            }
            _ => None,
        }
    }

    /// Returns rate limit information if the server sent any.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::HttpError {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }

    /// Attaches the HTTP status of the response a decode failure came from.
    pub(crate) fn with_status(self, status: StatusCode) -> Self {
        match self {
            Error::DeserializationFailed {
                raw_response,
                serde_error,
                ..
            } => Error::DeserializationFailed {
                raw_response,
                serde_error,
                status: Some(status),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Error::Timeout;
        }
        if err.is_builder() {
            return Error::ConfigurationError(error_chain(&err));
        }
        Error::Network(error_chain(&err))
    }
}

/// 429 Too Many Requests and 503 Service Unavailable.
pub(crate) fn is_throttle_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

// reqwest's top-level message hides the cause ("error sending request for url").
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A specialized `Result` type for fallible configuration steps.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status: StatusCode) -> Error {
        Error::HttpError {
            status,
            raw_response: "body".to_string(),
            headers: HeaderMap::new(),
            rate_limit_info: None,
        }
    }

    #[test]
    fn only_throttling_statuses_are_retryable() {
        assert!(http_error(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(http_error(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(!http_error(StatusCode::INTERNAL_SERVER_ERROR).is_retryable());
        assert!(!http_error(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!http_error(StatusCode::NOT_FOUND).is_retryable());
    }

    #[test]
    fn transport_failures_are_retryable() {
        assert!(Error::Network("connection refused".into()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::Validation(MISSING_URL.into()).is_retryable());
        assert!(!Error::SerializationFailed("bad".into()).is_retryable());
    }

    #[test]
    fn exhausted_retries_report_the_last_failure() {
        let err = Error::MaxRetriesExceeded {
            attempts: 4,
            last_error: Box::new(Error::Network("Network unreachable".into())),
        };

        assert_eq!(err.kind(), FailureKind::Transport);
        assert!(err.to_string().contains("Network unreachable"));
        assert!(err.diagnostic().unwrap().contains("Network unreachable"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn decode_failures_pick_up_the_response_status() {
        let err = Error::DeserializationFailed {
            raw_response: "oops".into(),
            serde_error: "expected value".into(),
            status: None,
        }
        .with_status(StatusCode::OK);

        assert_eq!(err.status(), Some(StatusCode::OK));
        assert_eq!(err.kind(), FailureKind::Serialization);
        assert_eq!(err.diagnostic().as_deref(), Some("oops"));
    }

    #[test]
    fn validation_failures_have_no_diagnostic() {
        let err = Error::Validation(MISSING_URL.into());
        assert_eq!(err.to_string(), "URL cannot be null.");
        assert_eq!(err.diagnostic(), None);
        assert_eq!(err.kind(), FailureKind::Validation);
    }
}
