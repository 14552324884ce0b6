//! Backoff managers: a policy plus a reusable timer.

use lull_clock::{Clock, Instant, Timer, TokioClock};
use std::fmt;
use std::time::Duration;

use super::backoff::Backoff;

/// Hands out armed timers for successive backoff waits.
///
/// # Contract
///
/// [`backoff`](BackoffManager::backoff) returns a timer that is shared
/// between calls and reset in place every time. The caller waits until the
/// timer fires (or stops and drains it) before calling `backoff` again;
/// taking `&mut self` makes overlapping calls impossible, and a manager is
/// never shared between concurrent loops.
pub trait BackoffManager: Send {
    /// Arms the timer for the next delay.
    ///
    /// Returns the timer and the number of growth steps left after this call.
    /// Zero means the budget is exhausted.
    fn backoff(&mut self) -> (&mut dyn Timer, u32);
}

/// Exponential backoff that forgets accumulated growth after a quiet period.
///
/// If more than `reset_after` elapses between two calls to
/// [`backoff`](BackoffManager::backoff), the policy starts over from the
/// initial delay with an unbounded step budget.
///
/// # Examples
///
/// ```rust
/// use lull::retry::{BackoffManager, ExponentialBackoffManager};
/// use lull::clock::{Clock, FakeClock};
/// use std::time::Duration;
///
/// let clock = FakeClock::default();
/// let mut manager = ExponentialBackoffManager::new(
///     Duration::from_secs(1),  // initial delay
///     Duration::from_secs(60), // cap
///     Duration::from_secs(120), // idle reset threshold
///     3,                        // step budget
///     2.0,                      // growth factor
///     0.0,                      // jitter
///     clock.clone(),
/// );
///
/// let (timer, remaining) = manager.backoff();
/// assert_eq!(timer.deadline(), Some(clock.now() + Duration::from_secs(1)));
/// assert_eq!(remaining, 2);
/// ```
pub struct ExponentialBackoffManager<C: Clock = TokioClock> {
    backoff: Backoff,
    timer: Option<Box<dyn Timer>>,
    last_backoff_start: Instant,
    initial_backoff: Duration,
    reset_after: Duration,
    clock: C,
}

impl<C: Clock> ExponentialBackoffManager<C> {
    /// Creates a manager.
    ///
    /// A zero `max_backoff` means the delay is not capped.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        initial_backoff: Duration,
        max_backoff: Duration,
        reset_after: Duration,
        steps: u32,
        factor: f64,
        jitter: f64,
        clock: C,
    ) -> Self {
        let last_backoff_start = clock.now();
        Self {
            backoff: Backoff {
                duration: initial_backoff,
                factor,
                jitter,
                steps,
                cap: (!max_backoff.is_zero()).then_some(max_backoff),
            },
            timer: None,
            last_backoff_start,
            initial_backoff,
            reset_after,
            clock,
        }
    }

    /// Steps left before the delay plateaus.
    pub fn remaining_steps(&self) -> u32 {
        self.backoff.steps
    }

    /// The base delay the next call starts from, before jitter.
    pub fn current_backoff(&self) -> Duration {
        self.backoff.duration
    }

    /// The shared timer, once the first `backoff` call created it.
    pub fn timer_mut(&mut self) -> Option<&mut dyn Timer> {
        match self.timer.as_mut() {
            Some(timer) => Some(&mut **timer),
            None => None,
        }
    }

    /// The clock this manager reads time from.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn next_backoff(&mut self) -> Duration {
        let idle = self.clock.since(self.last_backoff_start);
        if idle > self.reset_after {
            tracing::debug!(
                "Idle for {:?} (threshold {:?}), resetting backoff to {:?}",
                idle,
                self.reset_after,
                self.initial_backoff
            );
            self.backoff.steps = u32::MAX;
            self.backoff.duration = self.initial_backoff;
        }
        self.last_backoff_start = self.clock.now();
        self.backoff.step()
    }
}

impl<C: Clock> BackoffManager for ExponentialBackoffManager<C> {
    fn backoff(&mut self) -> (&mut dyn Timer, u32) {
        let delay = self.next_backoff();
        let timer = match self.timer.take() {
            Some(mut timer) => {
                timer.reset(delay);
                timer
            }
            None => self.clock.new_timer(delay),
        };

        let remaining = self.backoff.steps;
        tracing::trace!(?delay, remaining, "backoff timer armed");

        (&mut **self.timer.insert(timer), remaining)
    }
}

impl<C: Clock + fmt::Debug> fmt::Debug for ExponentialBackoffManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExponentialBackoffManager")
            .field("backoff", &self.backoff)
            .field(
                "timer_deadline",
                &self.timer.as_ref().and_then(|timer| timer.deadline()),
            )
            .field("last_backoff_start", &self.last_backoff_start)
            .field("initial_backoff", &self.initial_backoff)
            .field("reset_after", &self.reset_after)
            .field("clock", &self.clock)
            .finish()
    }
}
