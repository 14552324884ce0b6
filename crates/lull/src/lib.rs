#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Exponential backoff with idle reset, timer reuse and cooperative
//! cancellation.
//!
//! This crate provides:
//!
//! - **A stateful backoff policy** via [`retry::Backoff`]
//!   - Exponential growth with an optional cap and a step budget
//!   - Per-attempt jitter that never compounds into the base delay
//! - **Backoff managers** via the [`retry::BackoffManager`] trait
//!   - [`retry::ExponentialBackoffManager`] forgets growth after an idle period
//!   - One timer per manager, reset in place on every attempt
//! - **A retry loop** via [`retry::backoff_until`], stopped by a
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)
//! - **Pluggable time** via the [`clock`] re-export of `lull-clock`
//!
//! # Examples
//!
//! ```rust
//! use lull::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() -> lull::Result<()> {
//! let config = BackoffConfig::default()
//!     .with_initial(Duration::from_millis(100))
//!     .with_steps(4)
//!     .with_jitter(0.0);
//! let mut manager = config.build(TokioClock)?;
//!
//! let cancel = CancellationToken::new();
//! let mut attempts = 0;
//! backoff_until(
//!     || {
//!         attempts += 1;
//!         async {}
//!     },
//!     &mut manager,
//!     config.scheduling,
//!     &cancel,
//! )
//! .await;
//!
//! assert_eq!(attempts, 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod retry;

#[cfg(test)]
mod property_tests;

pub use error::{Error, Result};
pub use lull_clock as clock;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use lull::prelude::*;
/// ```
pub mod prelude {
    pub use crate::clock::{Clock, FakeClock, Instant, Timer, TokioClock};
    pub use crate::config::BackoffConfig;
    pub use crate::retry::{
        Backoff, BackoffManager, ExponentialBackoffManager, Scheduling, backoff_until,
    };
    pub use tokio_util::sync::CancellationToken;
}
