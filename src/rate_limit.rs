//! Reacting to server-signaled throttling.
//!
//! When a 429 or 503 response tells the client how long to back off, through
//! `Retry-After` or a rate limit reset header, the retry loop waits that long
//! instead of following its own backoff schedule. This never throttles
//! requests on the client side.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Throttling hints read from response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long to wait before retrying (`Retry-After`).
    pub retry_after: Option<Duration>,

    /// When the current window resets (`X-RateLimit-Reset` or `RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// Requests left in the current window (`X-RateLimit-Remaining`).
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Reads throttling hints from response headers.
    ///
    /// `Retry-After` may be delay-seconds or an HTTP date; reset headers are
    /// Unix timestamps.
    ///
    /// # Examples
    ///
    /// ```
    /// use bracer::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "7".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(7)));
    /// assert!(info.is_rate_limited());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: retry_after(headers),
            reset_at: reset_at(headers),
            remaining: header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse().ok()),
        }
    }

    /// Returns `true` if the headers describe an active throttle.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }

    /// The server-requested wait, capped at `max_wait`.
    ///
    /// `Retry-After` wins over the reset timestamp. A reset time in the past
    /// yields no delay.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }
        let until_reset = self.reset_at?.duration_since(SystemTime::now()).ok()?;
        Some(until_reset.min(max_wait))
    }
}

/// How the retry loop treats server throttling hints.
///
/// # Examples
///
/// ```
/// use bracer::rate_limit::RateLimitConfig;
/// use std::time::Duration;
///
/// let config = RateLimitConfig::builder()
///     .max_wait(Duration::from_secs(30))
///     .build();
/// assert!(config.enabled);
///
/// let off = RateLimitConfig::disabled();
/// assert!(!off.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Whether throttling hints replace the backoff delay.
    pub enabled: bool,

    /// Upper bound on any server-requested wait. Defaults to 5 minutes.
    pub max_wait: Duration,

    /// Whether `Retry-After` is honored. When `false` only reset headers count.
    pub respect_retry_after: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait: Duration::from_secs(300),
            respect_retry_after: true,
        }
    }
}

impl RateLimitConfig {
    /// Creates a builder starting from the defaults.
    pub fn builder() -> RateLimitConfigBuilder {
        RateLimitConfigBuilder::default()
    }

    /// A configuration that ignores throttling hints entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// The wait the server asked for on a throttled response, if honored.
    pub fn server_delay(&self, headers: &HeaderMap) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let mut info = RateLimitInfo::from_headers(headers);
        if !self.respect_retry_after {
            info.retry_after = None;
        }
        if !info.is_rate_limited() {
            return None;
        }
        info.delay(self.max_wait)
    }
}

/// Builder for [`RateLimitConfig`].
#[derive(Debug, Default)]
pub struct RateLimitConfigBuilder {
    enabled: Option<bool>,
    max_wait: Option<Duration>,
    respect_retry_after: Option<bool>,
}

impl RateLimitConfigBuilder {
    /// Sets whether throttling hints are honored.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the cap on server-requested waits.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Sets whether `Retry-After` is honored.
    pub fn respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = Some(respect);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RateLimitConfig {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            max_wait: self.max_wait.unwrap_or(defaults.max_wait),
            respect_retry_after: self
                .respect_retry_after
                .unwrap_or(defaults.respect_retry_after),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = header_str(headers, "retry-after")?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    // A date already in the past means "retry now".
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}

fn reset_at(headers: &HeaderMap) -> Option<SystemTime> {
    ["x-ratelimit-reset", "ratelimit-reset"]
        .iter()
        .filter_map(|name| header_str(headers, name))
        .find_map(|value| value.parse::<u64>().ok())
        .map(|timestamp| UNIX_EPOCH + Duration::from_secs(timestamp))
}
