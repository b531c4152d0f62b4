//! Caller-driven cancellation.
//!
//! A [`CancelToken`] is handed to a call through
//! [`CallOptions::cancel_token`](crate::CallOptions::cancel_token). Firing it
//! aborts the in-flight send or backoff wait and the call returns
//! `Err(`[`Cancelled`]`)` instead of an envelope.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// The call was aborted by its cancel token.
///
/// This is the only `Err` a facade operation ever returns; every other outcome
/// is reported through the [`Envelope`](crate::Envelope).
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Request was cancelled")]
pub struct Cancelled;

/// A clonable cancellation signal.
///
/// All clones observe the same state; cancelling one cancels them all, and a
/// token stays cancelled once fired.
///
/// # Examples
///
/// ```
/// use bracer::CancelToken;
///
/// let token = CancelToken::new();
/// let observer = token.clone();
///
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Fires the signal.
    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    /// Returns `true` once the signal has fired.
    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        let mut changes = self.state.subscribe();
        while !*changes.borrow_and_update() {
            if changes.changed().await.is_err() {
                // Unreachable while `self` holds the sender.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drives `fut` to completion unless the signal fires first.
    ///
    /// A signal that has already fired wins without polling `fut`. Dropping
    /// the losing future aborts whatever it was doing.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `fut` under an optional token.
pub(crate) async fn guard<F: Future>(
    token: Option<&CancelToken>,
    fut: F,
) -> Result<F::Output, Cancelled> {
    match token {
        Some(token) => token.run(fut).await,
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn already_cancelled_token_skips_the_future() {
        let token = CancelToken::new();
        token.cancel();

        let polled = std::sync::atomic::AtomicBool::new(false);
        let result = token
            .run(async { polled.store(true, std::sync::atomic::Ordering::SeqCst) })
            .await;

        assert_eq!(result, Err(Cancelled));
        assert!(!polled.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_sleep() {
        let token = CancelToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = token.run(tokio::time::sleep(Duration::from_secs(60))).await;

        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn untouched_token_lets_the_future_finish() {
        let token = CancelToken::default();
        assert_eq!(token.run(async { 7 }).await, Ok(7));
        assert_eq!(guard(None, async { 8 }).await, Ok(8));
    }
}
