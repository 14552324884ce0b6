//! The retry driver loop.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use tokio_util::sync::CancellationToken;

use super::manager::BackoffManager;
use crate::error::Error;

/// When the wait before the next attempt is armed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scheduling {
    /// Arm the timer before running the work: attempts start on a cadence
    /// measured from the start of each iteration, regardless of how long the
    /// work took.
    #[default]
    Fixed,
    /// Arm the timer after the work returns: the delay is the gap between one
    /// attempt finishing and the next one starting.
    Sliding,
}

impl FromStr for Scheduling {
    type Err = Error;

    /// Parses `fixed` or `sliding`, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("fixed") {
            Ok(Self::Fixed)
        } else if s.eq_ignore_ascii_case("sliding") {
            Ok(Self::Sliding)
        } else {
            Err(Error::invalid(
                "scheduling",
                format!("must be `fixed` or `sliding`, got `{s}`"),
            ))
        }
    }
}

/// Runs `work` repeatedly, backing off between runs, until `cancel` fires or
/// the manager's step budget is exhausted.
///
/// - Cancellation is checked before every attempt and raced against every
///   wait. A running attempt is never interrupted; cancellation only prevents
///   the next one.
/// - A panic inside `work` is caught, logged and treated as a normal return.
/// - When the budget reaches zero the loop returns right after that attempt,
///   without waiting.
///
/// Both exits are normal and indistinguishable to the caller. Inspect the
/// manager afterwards (or record outcomes from inside `work`) to tell them
/// apart.
///
/// # Examples
///
/// ```rust
/// use lull::prelude::*;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread", start_paused = true)]
/// # async fn main() {
/// let mut manager = ExponentialBackoffManager::new(
///     Duration::from_millis(10),
///     Duration::ZERO,
///     Duration::from_secs(60),
///     3,
///     2.0,
///     0.0,
///     TokioClock,
/// );
///
/// let mut attempts = 0;
/// backoff_until(
///     || {
///         attempts += 1;
///         async {}
///     },
///     &mut manager,
///     Scheduling::Sliding,
///     &CancellationToken::new(),
/// )
/// .await;
///
/// assert_eq!(attempts, 3);
/// # }
/// ```
pub async fn backoff_until<F, Fut, M>(
    mut work: F,
    manager: &mut M,
    scheduling: Scheduling,
    cancel: &CancellationToken,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
    M: BackoffManager + ?Sized,
{
    loop {
        if cancel.is_cancelled() {
            tracing::debug!("Backoff loop cancelled before the next attempt");
            return;
        }

        let (timer, remaining) = match scheduling {
            Scheduling::Fixed => {
                let armed = manager.backoff();
                run_isolated(&mut work).await;
                armed
            }
            Scheduling::Sliding => {
                run_isolated(&mut work).await;
                manager.backoff()
            }
        };

        if remaining == 0 {
            tracing::debug!("Backoff step budget exhausted, stopping");
            return;
        }

        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if !timer.stop() {
                    // Fired concurrently with the cancellation: consume it so
                    // the timer is clean for the next reset.
                    timer.drain();
                }
                tracing::debug!("Backoff loop cancelled while waiting");
                return;
            }
            _ = timer.fired() => {}
        }
    }
}

async fn run_isolated<F, Fut>(work: &mut F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let attempt = AssertUnwindSafe(async { work().await }).catch_unwind().await;
    if let Err(panic) = attempt {
        tracing::error!(
            "Work panicked, continuing backoff: {}",
            panic_message(&*panic)
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ExponentialBackoffManager;
    use lull_clock::FakeClock;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    fn manager(clock: &FakeClock, steps: u32) -> ExponentialBackoffManager<FakeClock> {
        ExponentialBackoffManager::new(
            Duration::from_secs(1),
            Duration::ZERO,
            Duration::from_secs(600),
            steps,
            2.0,
            0.0,
            clock.clone(),
        )
    }

    #[test]
    fn test_fake_clock_drives_each_attempt() {
        let clock = FakeClock::default();
        let mut manager = manager(&clock, 3);
        let cancel = CancellationToken::new();
        let mut attempts = 0;

        {
            let mut run = task::spawn(backoff_until(
                || {
                    attempts += 1;
                    async {}
                },
                &mut manager,
                Scheduling::Fixed,
                &cancel,
            ));

            assert_pending!(run.poll());
            clock.step(Duration::from_millis(999));
            assert_pending!(run.poll());
            clock.step(Duration::from_millis(1));
            assert!(run.is_woken());

            // Second attempt, then a 2s wait
            assert_pending!(run.poll());
            clock.step(Duration::from_secs(2));

            // Third attempt sees an exhausted budget
            assert_ready!(run.poll());
        }

        assert_eq!(attempts, 3);
        assert_eq!(manager.remaining_steps(), 0);
    }

    #[test]
    fn test_cancel_while_waiting_stops_timer() {
        let clock = FakeClock::default();
        let mut manager = manager(&clock, u32::MAX);
        let cancel = CancellationToken::new();

        {
            let mut run = task::spawn(backoff_until(
                || async {},
                &mut manager,
                Scheduling::Sliding,
                &cancel,
            ));
            assert_pending!(run.poll());

            cancel.cancel();
            assert!(run.is_woken());
            assert_ready!(run.poll());
        }

        let timer = manager.timer_mut().expect("timer was created");
        assert!(!timer.stop(), "timer already stopped");
        assert_eq!(timer.drain(), None);
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_cancel_after_timer_fired_drains_it() {
        let clock = FakeClock::default();
        let mut manager = manager(&clock, u32::MAX);
        let cancel = CancellationToken::new();

        {
            let mut run = task::spawn(backoff_until(
                || async {},
                &mut manager,
                Scheduling::Fixed,
                &cancel,
            ));
            assert_pending!(run.poll());

            // Both the timer and the cancellation are ready at the next poll
            clock.step(Duration::from_secs(5));
            cancel.cancel();
            assert_ready!(run.poll());
        }

        let timer = manager.timer_mut().expect("timer was created");
        assert_eq!(timer.drain(), None, "fired completion was drained");
        assert_eq!(timer.deadline(), None);
    }

    #[test]
    fn test_cancelled_token_skips_work() {
        let clock = FakeClock::default();
        let mut manager = manager(&clock, 5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut attempts = 0;

        let mut run = task::spawn(backoff_until(
            || {
                attempts += 1;
                async {}
            },
            &mut manager,
            Scheduling::Fixed,
            &cancel,
        ));
        assert_ready!(run.poll());
        drop(run);

        assert_eq!(attempts, 0);
        assert!(manager.timer_mut().is_none());
    }

    #[test]
    fn test_panic_before_future_is_returned() {
        let clock = FakeClock::default();
        let mut manager = manager(&clock, 3);
        let cancel = CancellationToken::new();
        let mut attempts = 0;

        {
            let mut run = task::spawn(backoff_until(
                || {
                    attempts += 1;
                    if attempts < 3 {
                        panic!("work {attempts} could not start");
                    }
                    async {}
                },
                &mut manager,
                Scheduling::Sliding,
                &cancel,
            ));

            assert_pending!(run.poll());
            clock.step(Duration::from_secs(1));
            assert_pending!(run.poll());
            clock.step(Duration::from_secs(2));
            assert_ready!(run.poll());
        }

        assert_eq!(attempts, 3);
        assert_eq!(manager.remaining_steps(), 0);
    }

    #[test]
    fn test_panic_message() {
        let from_str: Box<dyn Any + Send> = Box::new("static message");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(&*from_str), "static message");
        assert_eq!(panic_message(&*from_string), "owned message");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }

    #[test]
    fn test_scheduling_from_str() {
        assert_eq!("fixed".parse::<Scheduling>(), Ok(Scheduling::Fixed));
        assert_eq!(" Sliding ".parse::<Scheduling>(), Ok(Scheduling::Sliding));
        assert!(matches!(
            "random".parse::<Scheduling>(),
            Err(Error::InvalidConfig { field: "scheduling", .. })
        ));
    }

    #[test]
    fn test_scheduling_serde() {
        let sliding: Scheduling = serde_json::from_str("\"sliding\"").unwrap();
        assert_eq!(sliding, Scheduling::Sliding);
        assert_eq!(Scheduling::default(), Scheduling::Fixed);
    }
}
