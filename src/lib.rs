//! # Bracer - a resilient outbound HTTP client
//!
//! Bracer issues JSON requests against a remote endpoint, retries transient
//! failures with exponential backoff, and answers every call with the same
//! [`Envelope`] shape instead of raising on each failure mode.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bracer::{CallOptions, Client};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Defaults: 30s per-attempt timeout, up to 3 retries waiting 2s, 4s, 8s
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .build()?;
//!
//!     let user = client.get::<User>("/users/123", CallOptions::new()).await?;
//!     if user.success {
//!         println!("User: {:?} after {} attempt(s)", user.data, user.attempts);
//!     }
//!
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created = client
//!         .post::<_, User>("/users", &new_user, CallOptions::new().bearer_token("s3cr3t"))
//!         .await?;
//!     if !created.success {
//!         eprintln!("{}", created.error_message.unwrap_or_default());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Outcomes
//!
//! | What happened                        | Envelope                                     |
//! |--------------------------------------|----------------------------------------------|
//! | 2xx, body decoded                    | `success`, `data`                            |
//! | missing or malformed URL             | `kind = Validation`, nothing sent            |
//! | non-2xx status                       | `kind = Http`, `error_data` = raw body       |
//! | 2xx, body does not fit the type      | `kind = Serialization`, `error_data` = body  |
//! | connection / DNS / timeout, retried  | `kind = Transport`                           |
//!
//! Transport failures and 429/503 responses are retried; everything else is
//! final on the first attempt. Cancellation is the one outcome that is not an
//! envelope:
//!
//! ```no_run
//! use bracer::{CallOptions, CancelToken, Cancelled, Client};
//!
//! # async fn example(client: Client) {
//! let cancel = CancelToken::new();
//! let options = CallOptions::new().cancel_token(&cancel);
//!
//! match client.get::<serde_json::Value>("https://api.example.com/slow", options).await {
//!     Ok(envelope) => println!("finished: success={}", envelope.success),
//!     Err(Cancelled) => println!("aborted"),
//! }
//! # }
//! ```

pub mod cancel;
mod client;
mod error;
pub mod metadata;
pub mod rate_limit;
mod response;
pub mod retry;
pub mod serialization;
pub mod transport;

pub use cancel::{CancelToken, Cancelled};
pub use client::{Client, ClientBuilder};
pub use error::{Error, Result, MISSING_URL};
pub use metadata::{CallOptions, RequestMetadata};
pub use response::{Envelope, FailureKind};
pub use retry::{RetryPolicy, RetryPredicate, RetryStrategy};
pub use serialization::SerializationOptions;
