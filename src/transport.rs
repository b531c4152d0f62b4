//! The boundary between the request pipeline and the network.
//!
//! The pipeline only needs one capability from the network: send a fully built
//! request once and hand back whatever came back, or a transport error.
//! [`ReqwestTransport`] is the default; tests and embedders can inject their own
//! [`Transport`] through [`ClientBuilder::transport`](crate::ClientBuilder::transport).
//!
//! Cancellation is expressed by dropping the future returned from
//! [`Transport::send`]; implementations must abort the in-flight exchange when
//! that happens.

use crate::{Error, Result};
use async_trait::async_trait;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Per-attempt timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A request ready to go on the wire.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Fully resolved target URL
    pub url: Url,
    /// Every header to send, including auth and content negotiation
    pub headers: HeaderMap,
    /// Encoded body, if the request carries one
    pub body: Option<Vec<u8>>,
}

/// A response as received, before any classification.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// The body as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request, once.
///
/// Implementations return `Ok` for every response regardless of status and
/// `Err` only for transport-level failures, mapped to [`Error::Network`] or
/// [`Error::Timeout`] so the retry policy can classify them.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Performs exactly one network exchange.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport that enforces `timeout` on every attempt.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self::from_client(http, timeout))
    }

    /// Wraps an existing client, e.g. one with custom TLS or proxy settings.
    pub fn from_client(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// The per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(self.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(TransportResponse::new(status, headers, body.to_vec()))
    }
}
