#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Time as a capability.
//!
//! Code that waits should not call `tokio::time` directly; it should ask a
//! [`Clock`] for the current time, for sleeps, and for [`Timer`]s and
//! [`Ticker`]s. Production code passes a [`TokioClock`], tests pass either a
//! [`TokioClock`] under tokio's paused test time or a [`FakeClock`] that only
//! moves when told to.
//!
//! # Examples
//!
//! ```rust
//! use lull_clock::{Clock, FakeClock, Timer};
//! use std::time::Duration;
//!
//! let clock = FakeClock::default();
//! let mut timer = clock.new_timer(Duration::from_secs(1));
//!
//! clock.step(Duration::from_secs(2));
//!
//! // The timer fired while nobody was waiting on it.
//! assert!(!timer.stop());
//! assert!(timer.drain().is_some());
//! ```

use async_trait::async_trait;
use std::time::Duration;

mod after_func;
mod fake;
mod timer;
mod tokio_clock;

pub use after_func::AfterFunc;
pub use fake::{FakeClock, FakeTicker, FakeTimer};
pub use tokio::time::Instant;
pub use tokio_clock::{TokioClock, TokioTicker, TokioTimer};

/// A source of time that can also create timers and tickers.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }

    /// Waits until `duration` has passed on this clock.
    async fn sleep(&self, duration: Duration);

    /// Waits until `duration` has passed and returns the instant it fired at.
    async fn after(&self, duration: Duration) -> Instant {
        self.new_timer(duration).fired().await
    }

    /// Creates a timer armed to fire once after `duration`.
    fn new_timer(&self, duration: Duration) -> Box<dyn Timer>;

    /// Creates a ticker firing every `period`, starting one period from now.
    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker>;

    /// Runs `f` on a spawned task once `duration` has passed on this clock.
    ///
    /// [`AfterFunc::stop`] cancels the call if it has not started yet.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    fn after_func<F>(&self, duration: Duration, f: F) -> AfterFunc
    where
        F: FnOnce() + Send + 'static,
        Self: Sized,
    {
        AfterFunc::spawn(self.new_timer(duration), f)
    }
}

/// A one-shot, resettable timer.
///
/// A timer is armed, stopped and drained in place; callers are expected to
/// keep one timer and [`reset`](Timer::reset) it rather than creating a new
/// one per wait.
///
/// Resetting a timer that fired but whose completion was never read discards
/// that completion. Callers that care about it must [`drain`](Timer::drain)
/// first.
#[async_trait]
pub trait Timer: Send {
    /// Waits for the timer to fire and returns its deadline.
    ///
    /// A completion that is already pending is returned immediately. While
    /// the timer is stopped this never resolves. Dropping the future before
    /// it resolves leaves the timer untouched.
    async fn fired(&mut self) -> Instant;

    /// Stops the timer.
    ///
    /// Returns `true` if this call stopped an armed timer before it fired,
    /// `false` if it had already fired or was already stopped.
    fn stop(&mut self) -> bool;

    /// Re-arms the timer to fire after `duration`.
    ///
    /// Returns `true` if the timer was armed before the call.
    fn reset(&mut self, duration: Duration) -> bool;

    /// Consumes a completion that fired but was never observed.
    ///
    /// Never blocks.
    fn drain(&mut self) -> Option<Instant>;

    /// The instant this timer fires (or fired) at, if a completion is still
    /// outstanding.
    fn deadline(&self) -> Option<Instant>;
}

/// A periodic ticker. Ticks missed while nobody was waiting are dropped.
#[async_trait]
pub trait Ticker: Send {
    /// Waits for the next tick. Never resolves once stopped.
    async fn tick(&mut self) -> Instant;

    /// Stops the ticker.
    fn stop(&mut self);
}
