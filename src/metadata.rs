//! Per-call request description.

use crate::cancel::CancelToken;
use crate::serialization::SerializationOptions;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Optional knobs for a single call.
///
/// # Examples
///
/// ```
/// use bracer::{CallOptions, CancelToken};
/// use bracer::serialization::{SerializationOptions, UnknownFields};
///
/// let cancel = CancelToken::new();
/// let options = CallOptions::new()
///     .bearer_token("s3cr3t")
///     .serialization(SerializationOptions::default().with_unknown_fields(UnknownFields::Reject))
///     .cancel_token(&cancel)
///     .with_query_param("page", "2")
///     .with_header("x-trace", "abc")
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Credential sent as `Authorization: Bearer <token>` when non-empty.
    pub auth_token: Option<String>,

    /// Overrides the client's serialization rules for this call.
    pub serialization: Option<SerializationOptions>,

    /// Aborts the call when fired.
    pub cancel: Option<CancelToken>,

    /// Extra headers for this call.
    pub headers: HeaderMap,

    /// Query parameters appended to the URL, in order.
    pub query_params: Vec<(String, String)>,
}

impl CallOptions {
    /// Options with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a bearer credential.
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Overrides serialization rules for this call.
    pub fn serialization(mut self, options: SerializationOptions) -> Self {
        self.serialization = Some(options);
        self
    }

    /// Ties the call to a cancel token.
    pub fn cancel_token(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| crate::Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }
}

/// Everything needed to issue one call, except the body.
///
/// Owned by a single call and never shared.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP method.
    pub method: Method,

    /// Absolute URL, or a path relative to the client's base URL.
    ///
    /// `None` (or blank) fails validation without touching the network.
    pub url: Option<String>,

    /// Per-call options.
    pub options: CallOptions,
}

impl RequestMetadata {
    /// Describes a call to `url`.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: Some(url.into()),
            options: CallOptions::default(),
        }
    }

    /// Replaces the per-call options.
    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }
}

impl Default for RequestMetadata {
    fn default() -> Self {
        Self {
            method: Method::GET,
            url: None,
            options: CallOptions::default(),
        }
    }
}
