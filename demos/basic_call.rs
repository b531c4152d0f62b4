//! Basic example demonstrating GET and POST requests and reading envelopes.
//!
//! Run with: `cargo run --example basic_call`

use bracer::{CallOptions, Client, FailureKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[allow(dead_code)]
struct Post {
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("bracer=debug,basic_call=info")
        .init();

    // camelCase keys on the wire, so `user_id` travels as `userId`
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get::<Post>("/posts/1", CallOptions::new()).await?;
    match &response.data {
        Some(post) => {
            println!("Post ID: {}", post.id);
            println!("Title: {}", post.title);
        }
        None => println!("Failed: {:?}", response.error_message),
    }
    println!("Latency: {:?}, attempts: {}", response.latency, response.attempts);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let response = client
        .post::<_, Post>("/posts", &new_post, CallOptions::new())
        .await?;
    println!("Status: {:?}", response.status);
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());
    println!();

    println!("=== Failure Envelope Example ===");
    let missing = client
        .get::<Post>("/posts/does-not-exist", CallOptions::new())
        .await?;
    match missing.kind {
        Some(FailureKind::Http) => println!(
            "HTTP failure: {} (body: {:?})",
            missing.error_message.unwrap_or_default(),
            missing.error_data
        ),
        Some(kind) => println!("{:?} failure: {:?}", kind, missing.error_message),
        None => println!("Unexpected success"),
    }

    Ok(())
}
