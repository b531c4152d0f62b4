//! Retry strategies and predicates for handling transient failures.
//!
//! A [`RetryPolicy`] wraps a single-attempt send and re-invokes it while the
//! outcome is transient and the budget allows. It never looks at payloads;
//! only transport failures and response statuses drive its decisions.

use crate::cancel::{self, Cancelled};
use crate::rate_limit::RateLimitConfig;
use crate::transport::TransportResponse;
use crate::Error;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Defines how long to wait before each retry and how many retries to allow.
///
/// # Examples
///
/// ```
/// use bracer::RetryStrategy;
/// use std::time::Duration;
///
/// // 2s, 4s, 8s, then give up
/// let exponential = RetryStrategy::ExponentialBackoff {
///     initial_delay: Duration::from_secs(2),
///     max_delay: Duration::from_secs(60),
///     max_retries: 3,
///     jitter: false,
/// };
/// assert_eq!(exponential.delay_for_attempt(3), Some(Duration::from_secs(8)));
/// assert_eq!(exponential.delay_for_attempt(4), None);
///
/// let linear = RetryStrategy::Linear {
///     delay: Duration::from_millis(250),
///     max_retries: 2,
/// };
/// assert_eq!(linear.max_retries(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Never retry.
    #[default]
    None,

    /// Wait `initial_delay * 2^(n - 1)` before retry `n`, capped at `max_delay`.
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// The maximum number of retries after the first attempt.
        max_retries: usize,
        /// Scale each delay by a random factor in `[0.5, 1.0]`.
        jitter: bool,
    },

    /// Wait the same delay before every retry.
    Linear {
        /// The delay between attempts.
        delay: Duration,
        /// The maximum number of retries after the first attempt.
        max_retries: usize,
    },

    /// Custom schedule.
    Custom {
        /// Takes the retry number (1-indexed) and returns the delay before it,
        /// or `None` to stop.
        delay_fn: fn(retry: usize) -> Option<Duration>,
    },
}

impl RetryStrategy {
    /// Returns the delay before retry number `retry` (1 = first retry), or
    /// `None` once the budget is spent.
    pub fn delay_for_attempt(&self, retry: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if retry == 0 || retry > *max_retries {
                    return None;
                }

                let exponent = u32::try_from(retry - 1).unwrap_or(u32::MAX);
                let multiplier = 2u32.saturating_pow(exponent);
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let factor = rand::thread_rng().gen_range(0.5..=1.0);
                    Some(delay.mul_f64(factor))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { delay, max_retries } => {
                (retry > 0 && retry <= *max_retries).then_some(*delay)
            }
            RetryStrategy::Custom { delay_fn } => delay_fn(retry),
        }
    }

    /// Returns the retry budget, if the strategy has a fixed one.
    pub fn max_retries(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(0),
            RetryStrategy::ExponentialBackoff { max_retries, .. } => Some(*max_retries),
            RetryStrategy::Linear { max_retries, .. } => Some(*max_retries),
            RetryStrategy::Custom { .. } => None,
        }
    }
}

/// What a single send attempt produced.
#[derive(Debug, Clone, Copy)]
pub enum AttemptOutcome<'a> {
    /// The server answered, with any status.
    Response(&'a TransportResponse),
    /// The send failed before a response arrived.
    Failed(&'a Error),
}

/// Decides whether an attempt's outcome is worth another try.
///
/// # Examples
///
/// ```
/// use bracer::retry::AttemptOutcome;
/// use bracer::RetryPredicate;
///
/// struct RetryOnGatewayErrors;
///
/// impl RetryPredicate for RetryOnGatewayErrors {
///     fn should_retry(&self, outcome: &AttemptOutcome<'_>, _attempt: usize) -> bool {
///         matches!(
///             outcome,
///             AttemptOutcome::Response(r) if matches!(r.status.as_u16(), 502 | 504)
///         )
///     }
/// }
/// ```
pub trait RetryPredicate: Send + Sync {
    /// Returns `true` to retry.
    ///
    /// `attempt` is the 1-indexed number of the attempt that produced `outcome`.
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, attempt: usize) -> bool;
}

/// Retries transport failures and throttling responses (429, 503).
///
/// This is the default predicate.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTransient;

impl RetryPredicate for RetryOnTransient {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, attempt: usize) -> bool {
        match outcome {
            AttemptOutcome::Failed(error) => error.is_retryable(),
            AttemptOutcome::Response(_) => RetryOnThrottle.should_retry(outcome, attempt),
        }
    }
}

/// Retries only 429 Too Many Requests and 503 Service Unavailable responses.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnThrottle;

impl RetryPredicate for RetryOnThrottle {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, _attempt: usize) -> bool {
        matches!(
            outcome,
            AttemptOutcome::Response(response) if crate::error::is_throttle_status(response.status)
        )
    }
}

/// Retries any 5xx response.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryPredicate for RetryOn5xx {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, _attempt: usize) -> bool {
        matches!(outcome, AttemptOutcome::Response(r) if r.status.is_server_error())
    }
}

/// Retries only timeouts.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnTimeout;

impl RetryPredicate for RetryOnTimeout {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, _attempt: usize) -> bool {
        matches!(outcome, AttemptOutcome::Failed(Error::Timeout))
    }
}

/// Retries only connection-level failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnConnectionError;

impl RetryPredicate for RetryOnConnectionError {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, _attempt: usize) -> bool {
        matches!(outcome, AttemptOutcome::Failed(Error::Network(_)))
    }
}

/// Retries if ANY of the predicates says so.
///
/// # Examples
///
/// ```
/// use bracer::retry::{OrPredicate, RetryOn5xx, RetryOnTimeout};
///
/// let predicate = OrPredicate::new(vec![
///     Box::new(RetryOn5xx),
///     Box::new(RetryOnTimeout),
/// ]);
/// ```
pub struct OrPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl OrPredicate {
    /// Creates a new `OrPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for OrPredicate {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, attempt: usize) -> bool {
        self.predicates
            .iter()
            .any(|p| p.should_retry(outcome, attempt))
    }
}

/// Retries only if ALL of the predicates say so.
pub struct AndPredicate {
    predicates: Vec<Box<dyn RetryPredicate>>,
}

impl AndPredicate {
    /// Creates a new `AndPredicate` from a list of predicates.
    pub fn new(predicates: Vec<Box<dyn RetryPredicate>>) -> Self {
        Self { predicates }
    }
}

impl RetryPredicate for AndPredicate {
    fn should_retry(&self, outcome: &AttemptOutcome<'_>, attempt: usize) -> bool {
        self.predicates
            .iter()
            .all(|p| p.should_retry(outcome, attempt))
    }
}

/// The final result of a retried send.
#[derive(Debug)]
pub struct RetryOutcome {
    /// The last response received, or the failure that ended the loop.
    pub result: Result<TransportResponse, Error>,
    /// Number of attempts made.
    pub attempts: usize,
}

/// Strategy, predicate and throttling rules bundled into one reusable policy.
///
/// The default retries transport failures and 429/503 responses up to three
/// times, waiting 2s, 4s and 8s, unless the server asks for a specific wait.
///
/// # Examples
///
/// ```
/// use bracer::retry::{RetryOn5xx, RetryPolicy};
/// use bracer::RetryStrategy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default()
///     .with_strategy(RetryStrategy::Linear {
///         delay: Duration::from_millis(100),
///         max_retries: 5,
///     })
///     .with_predicate(RetryOn5xx);
/// assert_eq!(policy.strategy().max_retries(), Some(5));
/// ```
#[derive(Clone)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    predicate: Arc<dyn RetryPredicate>,
    rate_limit: RateLimitConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::ExponentialBackoff {
                initial_delay: Duration::from_secs(2),
                max_delay: Duration::from_secs(60),
                max_retries: 3,
                jitter: false,
            },
            predicate: Arc::new(RetryOnTransient),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// A policy that sends exactly once.
    pub fn never() -> Self {
        Self::default().with_strategy(RetryStrategy::None)
    }

    /// Replaces the delay schedule.
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replaces the retry predicate.
    pub fn with_predicate(mut self, predicate: impl RetryPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub(crate) fn with_boxed_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.predicate = Arc::from(predicate);
        self
    }

    /// Replaces the throttling rules.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// The delay schedule.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// The throttling rules.
    pub fn rate_limit(&self) -> &RateLimitConfig {
        &self.rate_limit
    }

    /// Invokes `send_once` until it produces a final outcome.
    ///
    /// `send_once` receives the 1-indexed attempt number and performs exactly
    /// one exchange. Both the sends and the waits between them run under
    /// `cancel`; once it fires no further attempt is made and `Err(Cancelled)`
    /// is returned.
    ///
    /// A transport failure that is still retryable when the budget runs out is
    /// reported as [`Error::MaxRetriesExceeded`]. A response is always returned
    /// as-is, even if its status would have warranted another try.
    pub async fn run<F, Fut>(
        &self,
        cancel: Option<&cancel::CancelToken>,
        mut send_once: F,
    ) -> Result<RetryOutcome, Cancelled>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<TransportResponse, Error>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = cancel::guard(cancel, send_once(attempt)).await?;

            let outcome = match &result {
                Ok(response) => AttemptOutcome::Response(response),
                Err(error) => AttemptOutcome::Failed(error),
            };
            if !self.predicate.should_retry(&outcome, attempt) {
                return Ok(RetryOutcome {
                    result,
                    attempts: attempt,
                });
            }

            let Some(delay) = self.delay_after(&outcome, attempt) else {
                tracing::warn!(attempts = attempt, "Retry budget exhausted");
                let result = match result {
                    Err(error) if attempt > 1 => Err(Error::MaxRetriesExceeded {
                        attempts: attempt,
                        last_error: Box::new(error),
                    }),
                    other => other,
                };
                return Ok(RetryOutcome {
                    result,
                    attempts: attempt,
                });
            };

            match &outcome {
                AttemptOutcome::Response(response) => tracing::warn!(
                    status = response.status.as_u16(),
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "Transient response, retrying after delay"
                ),
                AttemptOutcome::Failed(error) => tracing::warn!(
                    error = %error,
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "Request failed, retrying after delay"
                ),
            }

            cancel::guard(cancel, tokio::time::sleep(delay)).await?;
        }
    }

    fn delay_after(&self, outcome: &AttemptOutcome<'_>, attempt: usize) -> Option<Duration> {
        let scheduled = self.strategy.delay_for_attempt(attempt)?;

        if let AttemptOutcome::Response(response) = outcome {
            if let Some(server_delay) = self.rate_limit.server_delay(&response.headers) {
                tracing::info!(
                    rate_limit_delay_ms = server_delay.as_millis(),
                    attempt = attempt,
                    max_wait_secs = self.rate_limit.max_wait.as_secs(),
                    "Rate limited - waiting before retry"
                );
                return Some(server_delay);
            }
        }

        Some(scheduled)
    }
}
