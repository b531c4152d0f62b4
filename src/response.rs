//! The uniform result shape returned by every call.
//!
//! An [`Envelope`] is what callers branch on: `success` tells whether the call
//! produced usable data, `data` holds it, and on failure `error_message` and
//! `error_data` describe what went wrong. Transport metadata (status, headers,
//! latency, attempt count) rides along for observability.

use crate::Error;
use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// Which part of the pipeline a failed call broke down in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Missing or malformed input, detected before anything was sent.
    Validation,
    /// Connection, DNS or timeout failure from the transport.
    Transport,
    /// The server answered with a non-2xx status.
    Http,
    /// The request body could not be encoded or the response body decoded.
    Serialization,
}

/// Success/failure wrapper returned from every operation.
///
/// Exactly one of `data` and `error_message` is populated after a completed
/// call.
///
/// # Examples
///
/// ```no_run
/// use bracer::{CallOptions, Client};
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize)]
/// struct Item {
///     id: u32,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().base_url("https://api.example.com")?.build()?;
///
/// let envelope = client.get::<Item>("/items/1", CallOptions::new()).await?;
/// if envelope.success {
///     println!("Item: {:?}", envelope.data);
/// } else {
///     eprintln!("Failed: {}", envelope.error_message.unwrap_or_default());
///     if let Some(detail) = envelope.error_data {
///         eprintln!("  detail: {}", detail);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    /// `true` iff the final response was 2xx and its body decoded.
    pub success: bool,

    /// The decoded response body, present only on success.
    pub data: Option<T>,

    /// Human-readable summary of the failure, present only on failure.
    pub error_message: Option<String>,

    /// Raw response body or transport diagnostic, when the failure has one.
    pub error_data: Option<String>,

    /// The failure category, present only on failure.
    pub kind: Option<FailureKind>,

    /// The status of the final response, if one was received.
    pub status: Option<StatusCode>,

    /// The headers of the final response (empty when none was received).
    pub headers: HeaderMap,

    /// Wall time spent on the call, including backoff waits.
    pub latency: Duration,

    /// Number of send attempts made. `0` when the call failed validation.
    pub attempts: usize,
}

impl<T> Envelope<T> {
    /// Builds a successful envelope around decoded data.
    pub fn success(
        data: T,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
            error_data: None,
            kind: None,
            status: Some(status),
            headers,
            latency,
            attempts,
        }
    }

    /// Normalizes a failure into an envelope.
    pub fn failure(error: Error, latency: Duration, attempts: usize) -> Self {
        let status = error.status();
        let error_message = Some(error.to_string());
        let error_data = error.diagnostic();
        let kind = Some(error.kind());
        let headers = match error {
            Error::HttpError { headers, .. } => headers,
            _ => HeaderMap::new(),
        };

        Self {
            success: false,
            data: None,
            error_message,
            error_data,
            kind,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Returns `true` if the call succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a response header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bracer::Envelope;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-request-id", HeaderValue::from_static("abc"));
    ///
    /// let envelope = Envelope::success((), StatusCode::OK, headers, Duration::ZERO, 1);
    /// assert_eq!(envelope.header("x-request-id"), Some("abc"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Maps the data to a different type, keeping everything else.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        Envelope {
            success: self.success,
            data: self.data.map(f),
            error_message: self.error_message,
            error_data: self.error_data,
            kind: self.kind,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Consumes the envelope, returning the data if the call succeeded.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}
