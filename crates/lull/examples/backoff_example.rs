//! Example: Driving work with `backoff_until`
//!
//! This example demonstrates:
//! 1. Polling an unreliable service until it succeeds, stopping the loop from
//!    inside the work
//! 2. A long-running loop built from environment configuration, stopped with
//!    Ctrl-C
//!
//! Run with:
//! ```bash
//! RUST_LOG=lull=trace cargo run -p lull --example backoff_example
//! ```
//!
//! The second loop reads `LULL_BACKOFF_*` variables, e.g.
//! `LULL_BACKOFF_INITIAL_MS=200 LULL_BACKOFF_MAX_MS=2000 LULL_BACKOFF_SCHEDULING=sliding`.

use lull::prelude::*;
use std::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A simulated service that fails the first few times
struct UnreliableService {
    attempts: AtomicU32,
    fail_count: u32,
}

impl UnreliableService {
    fn new(fail_count: u32) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            fail_count,
        }
    }

    async fn call(&self) -> Result<String, std::io::Error> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);

        if attempt < self.fail_count {
            println!("  Attempt {}: FAILED (simulating transient error)", attempt + 1);
            Err(std::io::Error::other(format!(
                "Transient error on attempt {}",
                attempt + 1
            )))
        } else {
            println!("  Attempt {}: SUCCESS", attempt + 1);
            Ok("service response".to_string())
        }
    }
}

/// Example 1: Retry until success
async fn example_until_success() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 1: Retry Until Success ===\n");

    let mut manager = BackoffConfig::default()
        .with_initial(Duration::from_millis(100))
        .with_jitter(0.0)
        .build(TokioClock)?;

    let service = UnreliableService::new(3);
    let done = CancellationToken::new();
    let start = Instant::now();

    backoff_until(
        || {
            let service = &service;
            let done = &done;
            async move {
                if let Ok(response) = service.call().await {
                    println!("  Got: {response}");
                    done.cancel();
                }
            }
        },
        &mut manager,
        Scheduling::Sliding,
        &done,
    )
    .await;

    println!("\nFinished after {:?}", start.elapsed());
    println!("Next delay would start from {:?}", manager.current_backoff());
    Ok(())
}

/// Example 2: Heartbeat with backoff until Ctrl-C
async fn example_until_ctrl_c() -> Result<(), Box<dyn Error>> {
    println!("\n=== Example 2: Backoff Until Ctrl-C ===\n");

    let config = BackoffConfig::from_env()?;
    println!("Config: {}", serde_json::to_string(&config)?);

    let mut manager = config.build(TokioClock)?;
    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let start = Instant::now();
    let mut beats = 0u32;
    backoff_until(
        || {
            beats += 1;
            println!("  [{:.2?}] heartbeat {beats}", start.elapsed());
            async {}
        },
        &mut manager,
        config.scheduling,
        &cancel,
    )
    .await;

    println!("\nStopped after {beats} heartbeats");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    example_until_success().await?;
    example_until_ctrl_c().await?;
    Ok(())
}
