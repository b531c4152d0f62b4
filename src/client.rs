//! HTTP client with retry logic and a uniform result envelope.
//!
//! The [`Client`] type is the main entry point for making HTTP requests.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    cancel::{CancelToken, Cancelled},
    error::MISSING_URL,
    metadata::{CallOptions, RequestMetadata},
    rate_limit::{RateLimitConfig, RateLimitInfo},
    retry::{RetryOutcome, RetryPolicy, RetryPredicate, RetryStrategy},
    serialization::{self, SerializationOptions},
    transport::{ReqwestTransport, Transport, TransportRequest, DEFAULT_TIMEOUT},
    Envelope, Error, Result,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// A reusable HTTP client whose calls never fail except by cancellation.
///
/// Every call resolves to an [`Envelope`]: validation problems, transport
/// failures, HTTP errors and undecodable bodies all come back as a failed
/// envelope. The only `Err` is [`Cancelled`].
///
/// The client is immutable and cheap to clone; share one across tasks.
///
/// # Examples
///
/// ```no_run
/// use bracer::{CallOptions, Client};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct CreateItem {
///     name: String,
/// }
///
/// #[derive(Debug, Default, Deserialize)]
/// struct Item {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let created = client
///     .post::<_, Item>(
///         "/items",
///         &CreateItem { name: "lamp".into() },
///         CallOptions::new().bearer_token("s3cr3t"),
///     )
///     .await?;
///
/// match created.data {
///     Some(item) => println!("Created item {}", item.id),
///     None => eprintln!("Create failed: {:?}", created.error_message),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    serialization: SerializationOptions,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.inner.transport)
            .field("base_url", &self.inner.base_url)
            .field("retry_policy", &self.inner.retry_policy)
            .field("serialization", &self.inner.serialization)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Makes a typed HTTP request.
    ///
    /// This is the pipeline every verb method goes through: validate and build
    /// the request, send it under the retry policy, then classify the outcome
    /// into an envelope. `body` is only sent for POST, PUT and PATCH.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if the call's cancel token fires before the call
    /// completes. Every other outcome is an `Ok` envelope.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bracer::{metadata::RequestMetadata, CallOptions, Client};
    /// use http::Method;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder().build()?;
    ///
    /// let metadata = RequestMetadata::new(Method::GET, "https://api.example.com/search")
    ///     .with_options(CallOptions::new().with_query_param("q", "rust"));
    ///
    /// let envelope = client.call::<(), serde_json::Value>(metadata, None).await?;
    /// println!("{:?}", envelope.data);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<Req, Res>(
        &self,
        metadata: RequestMetadata,
        body: Option<&Req>,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let start_time = Instant::now();
        let RequestMetadata {
            method,
            url,
            options,
        } = metadata;

        let cancel = options.cancel.as_ref();
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(Cancelled);
        }
        let serialization = options
            .serialization
            .as_ref()
            .unwrap_or(&self.inner.serialization);

        let request = match self.build_request(
            &method,
            url.as_deref(),
            &options,
            body,
            serialization,
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    method = %method,
                    "Request rejected before sending"
                );
                return Ok(Envelope::failure(e, start_time.elapsed(), 0));
            }
        };

        let transport = &self.inner.transport;
        let outcome = self
            .inner
            .retry_policy
            .run(cancel, |attempt| {
                let request = request.clone();
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempt,
                    "Executing HTTP request"
                );
                async move { transport.send(request).await }
            })
            .await?;

        Ok(classify(outcome, start_time.elapsed(), serialization))
    }

    /// Resolves the URL and assembles headers and body.
    fn build_request<Req>(
        &self,
        method: &Method,
        url: Option<&str>,
        options: &CallOptions,
        body: Option<&Req>,
        serialization: &SerializationOptions,
    ) -> Result<TransportRequest>
    where
        Req: Serialize + ?Sized,
    {
        let url = match url.map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(Error::Validation(MISSING_URL.to_string())),
        };

        let mut url = match &self.inner.base_url {
            Some(base) => base.join(url)?,
            None => Url::parse(url)?,
        };
        if !options.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &options.query_params {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &self.inner.default_headers {
            headers.insert(name, value.clone());
        }
        for (name, value) in &options.headers {
            headers.insert(name, value.clone());
        }

        if let Some(token) = options.auth_token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::try_from(format!("Bearer {}", token)).map_err(|e| {
                Error::ConfigurationError(format!("Invalid bearer token: {}", e))
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let carries_body = matches!(*method, Method::POST | Method::PUT | Method::PATCH);
        let body = match body {
            Some(body) if carries_body => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Some(serialization::serialize(body, serialization)?.into_bytes())
            }
            _ => None,
        };

        Ok(TransportRequest {
            method: method.clone(),
            url,
            headers,
            body,
        })
    }

    /// Makes a GET request.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bracer::{CallOptions, Client};
    /// use serde::Deserialize;
    ///
    /// #[derive(Default, Deserialize)]
    /// struct Item { name: String }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = Client::builder().base_url("https://api.example.com")?.build()?;
    ///
    /// let item = client.get::<Item>("/items/1", CallOptions::new()).await?;
    /// if let Some(item) = item.data {
    ///     println!("Item: {}", item.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<Res>(
        &self,
        url: impl Into<String>,
        options: CallOptions,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Res: DeserializeOwned + Default,
    {
        let metadata = RequestMetadata::new(Method::GET, url).with_options(options);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<Req, Res>(
        &self,
        url: impl Into<String>,
        body: &Req,
        options: CallOptions,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let metadata = RequestMetadata::new(Method::POST, url).with_options(options);
        self.call(metadata, Some(body)).await
    }

    /// Makes a POST request with a JSON array body, expecting an array back.
    pub async fn post_expecting_array<Req, Res>(
        &self,
        url: impl Into<String>,
        body: &[Req],
        options: CallOptions,
    ) -> std::result::Result<Envelope<Vec<Res>>, Cancelled>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        self.post::<[Req], Vec<Res>>(url, body, options).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<Req, Res>(
        &self,
        url: impl Into<String>,
        body: &Req,
        options: CallOptions,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let metadata = RequestMetadata::new(Method::PUT, url).with_options(options);
        self.call(metadata, Some(body)).await
    }

    /// Makes a DELETE request.
    pub async fn delete<Res>(
        &self,
        url: impl Into<String>,
        options: CallOptions,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Res: DeserializeOwned + Default,
    {
        let metadata = RequestMetadata::new(Method::DELETE, url).with_options(options);
        self.call::<(), Res>(metadata, None).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        url: impl Into<String>,
        body: &Req,
        options: CallOptions,
    ) -> std::result::Result<Envelope<Res>, Cancelled>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned + Default,
    {
        let metadata = RequestMetadata::new(Method::PATCH, url).with_options(options);
        self.call(metadata, Some(body)).await
    }
}

/// Turns the final attempt into an envelope.
fn classify<Res>(
    outcome: RetryOutcome,
    latency: Duration,
    serialization: &SerializationOptions,
) -> Envelope<Res>
where
    Res: DeserializeOwned + Default,
{
    let RetryOutcome { result, attempts } = outcome;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                error = %e,
                attempts = attempts,
                "Request failed"
            );
            return Envelope::failure(e, latency, attempts);
        }
    };

    let status = response.status;
    let raw_body = response.text();

    tracing::info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis(),
        attempts = attempts,
        "Received HTTP response"
    );

    if !status.is_success() {
        if status.is_client_error() {
            tracing::error!(
                status = status.as_u16(),
                response = %raw_body,
                "Client error (4xx)"
            );
        } else if status.is_server_error() {
            tracing::warn!(
                status = status.as_u16(),
                response = %raw_body,
                "Server error (5xx)"
            );
        }

        let info = RateLimitInfo::from_headers(&response.headers);
        let error = Error::HttpError {
            status,
            raw_response: raw_body,
            headers: response.headers,
            rate_limit_info: info.is_rate_limited().then_some(info),
        };
        return Envelope::failure(error, latency, attempts);
    }

    match serialization::deserialize::<Res>(&raw_body, serialization) {
        Ok(data) => Envelope::success(data, status, response.headers, latency, attempts),
        Err(e) => {
            let e = e.with_status(status);
            tracing::error!(
                error = %e,
                raw_response = %raw_body,
                "Failed to deserialize response"
            );
            Envelope::failure(e, latency, attempts)
        }
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// Defaults: no base URL, 30 second per-attempt timeout, the default
/// [`RetryPolicy`] (transport failures and 429/503, waiting 2s, 4s, 8s),
/// camelCase JSON keys, and the reqwest transport.
///
/// # Examples
///
/// ```no_run
/// use bracer::{ClientBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), bracer::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com")?
///     .timeout(Duration::from_secs(10))
///     .retry_strategy(RetryStrategy::ExponentialBackoff {
///         initial_delay: Duration::from_millis(100),
///         max_delay: Duration::from_secs(5),
///         max_retries: 3,
///         jitter: true,
///     })
///     .default_header("User-Agent", "my-app/1.0")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    retry_policy: RetryPolicy,
    timeout: Duration,
    serialization: SerializationOptions,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            retry_policy: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
            serialization: SerializationOptions::default(),
            transport: None,
        }
    }

    /// Sets the base URL relative call URLs are joined onto.
    ///
    /// Joining follows URL resolution rules: keep a trailing slash on the
    /// base if it has a path prefix that should be preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Replaces the whole retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the delay schedule for retries.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_policy = self.retry_policy.with_strategy(strategy);
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default transport failures and 429/503 responses are retried.
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_policy = self.retry_policy.with_boxed_predicate(predicate);
        self
    }

    /// Sets how server throttling hints are honored.
    pub fn rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.retry_policy = self.retry_policy.with_rate_limit(config);
        self
    }

    /// Sets the per-attempt timeout of the default transport.
    ///
    /// Ignored when a custom transport is supplied.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the serialization rules used when a call does not override them.
    pub fn serialization(mut self, options: SerializationOptions) -> Self {
        self.serialization = options;
        self
    }

    /// Sends requests through `transport` instead of the default reqwest one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default transport cannot be created.
    pub fn build(self) -> Result<Client> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.timeout)?),
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                base_url: self.base_url,
                default_headers: self.default_headers,
                retry_policy: self.retry_policy,
                serialization: self.serialization,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use crate::FailureKind;
    use async_trait::async_trait;
    use http::StatusCode;
    use serde::Deserialize;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct TestItem {
        id: u32,
        name: String,
    }

    /// Replays canned outcomes and records what was sent.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Result<TransportResponse>>>,
        sent: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn replying(replies: Vec<Result<TransportResponse>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::default(),
            })
        }

        fn sent(&self) -> Vec<TransportRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            self.sent.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("script exhausted".into())))
        }
    }

    fn json(status: u16, body: &str) -> Result<TransportResponse> {
        Ok(TransportResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.as_bytes().to_vec(),
        ))
    }

    fn client(transport: Arc<ScriptedTransport>) -> Client {
        Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn missing_url_fails_without_sending() {
        let transport = ScriptedTransport::replying(vec![]);
        let client = client(transport.clone());

        let envelope = client
            .call::<(), TestItem>(RequestMetadata::default(), None)
            .await
            .unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.error_message.as_deref(), Some("URL cannot be null."));
        assert_eq!(envelope.kind, Some(FailureKind::Validation));
        assert_eq!(envelope.attempts, 0);

        let blank = client
            .post::<_, TestItem>("   ", &TestItem::default(), CallOptions::new())
            .await
            .unwrap();
        assert_eq!(blank.error_message.as_deref(), Some("URL cannot be null."));

        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn every_request_accepts_json_and_carries_the_token() {
        let transport =
            ScriptedTransport::replying(vec![json(200, r#"{"id":1,"name":"Test Item"}"#)]);
        let client = client(transport.clone());

        let envelope = client
            .get::<TestItem>(
                "/items/1",
                CallOptions::new()
                    .bearer_token("tok")
                    .with_query_param("expand", "true"),
            )
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(
            envelope.data,
            Some(TestItem {
                id: 1,
                name: "Test Item".into()
            })
        );

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url.as_str(), "https://api.example.com/items/1?expand=true");
        assert_eq!(sent[0].headers[header::ACCEPT], "application/json");
        assert_eq!(sent[0].headers[header::AUTHORIZATION], "Bearer tok");
        assert!(sent[0].headers.get(header::CONTENT_TYPE).is_none());
        assert!(sent[0].body.is_none());
    }

    #[tokio::test]
    async fn empty_token_is_not_attached() {
        let transport = ScriptedTransport::replying(vec![json(204, "")]);
        let client = client(transport.clone());

        let envelope = client
            .delete::<()>("/items/1", CallOptions::new().bearer_token(""))
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data, Some(()));
        assert!(transport.sent()[0].headers.get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn body_is_sent_only_for_post_put_patch() {
        let transport = ScriptedTransport::replying(vec![
            json(200, "{}"),
            json(200, "{}"),
            json(200, "{}"),
            json(200, "{}"),
        ]);
        let client = client(transport.clone());
        let item = TestItem {
            id: 3,
            name: "x".into(),
        };

        for method in [Method::POST, Method::PUT, Method::PATCH, Method::GET] {
            let metadata = RequestMetadata::new(method, "/items");
            let envelope = client
                .call::<_, serde_json::Value>(metadata, Some(&item))
                .await
                .unwrap();
            assert!(envelope.success);
        }

        let sent = transport.sent();
        for request in &sent[..3] {
            assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
            let body: serde_json::Value =
                serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
            assert_eq!(body, serde_json::json!({"id": 3, "name": "x"}));
        }
        assert!(sent[3].body.is_none());
        assert!(sent[3].headers.get(header::CONTENT_TYPE).is_none());
    }

    #[tokio::test]
    async fn server_error_keeps_status_and_body() {
        let transport =
            ScriptedTransport::replying(vec![json(500, r#"{"error":"Internal server error"}"#)]);
        let client = client(transport.clone());

        let envelope = client
            .get::<TestItem>("/items", CallOptions::new())
            .await
            .unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.error_message.as_deref().unwrap().contains("500"));
        assert_eq!(
            envelope.error_data.as_deref(),
            Some(r#"{"error":"Internal server error"}"#)
        );
        assert_eq!(envelope.kind, Some(FailureKind::Http));
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_success_body_is_a_serialization_failure() {
        let transport =
            ScriptedTransport::replying(vec![json(200, r#"{"id":"one","name":"Test Item"}"#)]);
        let client = client(transport);

        let envelope = client
            .get::<TestItem>("/items/1", CallOptions::new())
            .await
            .unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.kind, Some(FailureKind::Serialization));
        assert_eq!(envelope.status, Some(StatusCode::OK));
        assert!(envelope
            .error_message
            .as_deref()
            .unwrap()
            .starts_with("Failed to deserialize response"));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_then_successful_takes_three_attempts() {
        let transport = ScriptedTransport::replying(vec![
            json(503, "unavailable"),
            json(429, "slow down"),
            json(200, r#"{"status":"Success"}"#),
        ]);
        let client = client(transport.clone());

        let envelope = client
            .get::<serde_json::Value>("/jobs/1", CallOptions::new())
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap()["status"], "Success");
        assert_eq!(envelope.attempts, 3);
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_network_failure_is_reported_after_four_attempts() {
        let transport = ScriptedTransport::replying(
            (0..4)
                .map(|_| Err(Error::Network("Network unreachable".into())))
                .collect(),
        );
        let client = client(transport.clone());

        let envelope = client
            .get::<TestItem>("/items", CallOptions::new())
            .await
            .unwrap();

        assert!(!envelope.success);
        assert_eq!(envelope.kind, Some(FailureKind::Transport));
        assert!(envelope
            .error_message
            .as_deref()
            .unwrap()
            .contains("Network unreachable"));
        assert!(envelope.error_data.is_some());
        assert_eq!(envelope.attempts, 4);
        assert_eq!(transport.sent().len(), 4);
    }

    #[tokio::test]
    async fn cancelled_token_propagates_instead_of_an_envelope() {
        let transport = ScriptedTransport::replying(vec![json(200, "{}")]);
        let client = client(transport.clone());
        let token = CancelToken::new();
        token.cancel();

        let result = client
            .get::<serde_json::Value>("/items", CallOptions::new().cancel_token(&token))
            .await;

        assert_eq!(result.unwrap_err(), Cancelled);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn per_call_serialization_overrides_the_client_default() {
        use crate::serialization::UnknownFields;

        let body = r#"{"id":1,"name":"a","extra":true}"#;
        let transport = ScriptedTransport::replying(vec![json(200, body), json(200, body)]);
        let client = client(transport);

        let lenient = client
            .get::<TestItem>("/items/1", CallOptions::new())
            .await
            .unwrap();
        assert!(lenient.success);

        let strict = SerializationOptions::default().with_unknown_fields(UnknownFields::Reject);
        let rejected = client
            .get::<TestItem>("/items/1", CallOptions::new().serialization(strict))
            .await
            .unwrap();
        assert!(!rejected.success);
        assert!(rejected.error_message.unwrap().contains("extra"));
    }

    #[tokio::test]
    async fn array_convenience_posts_and_decodes_arrays() {
        let transport = ScriptedTransport::replying(vec![json(
            201,
            r#"[{"id":1,"name":"a"},{"id":2,"name":"b"}]"#,
        )]);
        let client = client(transport.clone());
        let batch = [TestItem::default(), TestItem::default()];

        let envelope = client
            .post_expecting_array::<TestItem, TestItem>("/items/batch", &batch, CallOptions::new())
            .await
            .unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().len(), 2);
        let sent: serde_json::Value =
            serde_json::from_slice(transport.sent()[0].body.as_deref().unwrap()).unwrap();
        assert!(sent.is_array());
    }

    #[tokio::test]
    async fn relative_url_without_base_is_a_validation_failure() {
        let transport = ScriptedTransport::replying(vec![]);
        let client = Client::builder().transport(transport).build().unwrap();

        let envelope = client
            .get::<TestItem>("/items", CallOptions::new())
            .await
            .unwrap();

        assert_eq!(envelope.kind, Some(FailureKind::Validation));
        assert!(envelope.error_message.unwrap().starts_with("Invalid URL"));
    }
}
