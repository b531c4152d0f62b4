//! Example demonstrating cancellation and retry tuning.
//!
//! Run with: `cargo run --example cancellation`

use bracer::{CallOptions, CancelToken, Cancelled, Client, RetryStrategy};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("bracer=debug")
        .init();

    // httpbin answers /status/503 forever, so the client sits in backoff
    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .timeout(Duration::from_secs(10))
        .retry_strategy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            max_retries: 3,
            jitter: true,
        })
        .build()?;

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        println!("Cancelling...");
        trigger.cancel();
    });

    let options = CallOptions::new().cancel_token(&cancel);
    match client.get::<serde_json::Value>("/status/503", options).await {
        Ok(envelope) => println!(
            "Finished after {} attempt(s): success={}",
            envelope.attempts, envelope.success
        ),
        Err(Cancelled) => println!("Call was cancelled before it completed"),
    }

    Ok(())
}
