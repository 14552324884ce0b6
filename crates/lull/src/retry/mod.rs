//! Backoff policies, managers and the retry loop.
//!
//! # Key Types
//!
//! - [`Backoff`] - The stateful delay policy (growth, cap, jitter, step budget)
//! - [`BackoffManager`] - Hands out an armed, reusable timer per attempt
//! - [`ExponentialBackoffManager`] - Exponential manager that resets after idling
//! - [`backoff_until`] - Runs work with backoff until cancelled or exhausted
//!
//! # Examples
//!
//! ```rust
//! use lull::retry::Backoff;
//! use std::time::Duration;
//!
//! let mut backoff = Backoff {
//!     duration: Duration::from_millis(100),
//!     factor: 2.0,
//!     steps: 2,
//!     cap: Some(Duration::from_millis(150)),
//!     ..Backoff::default()
//! };
//!
//! assert_eq!(backoff.step(), Duration::from_millis(100));
//! assert_eq!(backoff.step(), Duration::from_millis(150));
//! ```

mod backoff;
mod manager;
mod until;

pub use backoff::{Backoff, jitter, next_delay};
pub use manager::{BackoffManager, ExponentialBackoffManager};
pub use until::{Scheduling, backoff_until};
