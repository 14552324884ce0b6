//! The production clock, backed by `tokio::time`.

use async_trait::async_trait;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

use crate::timer::{Phase, TimerState, next_tick};
use crate::{Clock, Ticker, Timer};

/// A [`Clock`] that delegates to `tokio::time`.
///
/// Under `#[tokio::test(start_paused = true)]` this clock follows tokio's
/// paused time, so it doubles as a deterministic test clock.
///
/// Timers and tickers can be created, stopped and reset outside a runtime;
/// only awaiting them needs one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn new_timer(&self, duration: Duration) -> Box<dyn Timer> {
        Box::new(TokioTimer::new(duration))
    }

    fn new_ticker(&self, period: Duration) -> Box<dyn Ticker> {
        Box::new(TokioTicker::new(period))
    }
}

/// Timer returned by [`TokioClock::new_timer`].
#[derive(Debug)]
pub struct TokioTimer {
    state: TimerState,
    // Created on first wait so that arming never touches the runtime.
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TokioTimer {
    /// Creates a timer armed to fire after `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            state: TimerState::armed(Instant::now(), duration),
            sleep: None,
        }
    }
}

#[async_trait]
impl Timer for TokioTimer {
    async fn fired(&mut self) -> Instant {
        let now = Instant::now();
        let deadline = match self.state.settle(now) {
            Phase::Idle => return std::future::pending::<Instant>().await,
            Phase::Expired(deadline) => {
                self.state.observe();
                return deadline;
            }
            Phase::Armed(deadline) => deadline,
        };

        let sleep = self
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        sleep.as_mut().reset(deadline);
        sleep.as_mut().await;

        self.state.observe();
        deadline
    }

    fn stop(&mut self) -> bool {
        self.state.stop(Instant::now())
    }

    fn reset(&mut self, duration: Duration) -> bool {
        self.state.reset(Instant::now(), duration)
    }

    fn drain(&mut self) -> Option<Instant> {
        self.state.drain(Instant::now())
    }

    fn deadline(&self) -> Option<Instant> {
        self.state.deadline()
    }
}

/// Ticker returned by [`TokioClock::new_ticker`].
#[derive(Debug)]
pub struct TokioTicker {
    period: Duration,
    next: Option<Instant>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TokioTicker {
    /// Creates a ticker whose first tick is one `period` from now.
    ///
    /// A zero period is treated as one nanosecond.
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_nanos(1));
        Self {
            period,
            next: Some(Instant::now() + period),
            sleep: None,
        }
    }
}

#[async_trait]
impl Ticker for TokioTicker {
    async fn tick(&mut self) -> Instant {
        let Some(deadline) = self.next else {
            return std::future::pending::<Instant>().await;
        };

        let sleep = self
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        sleep.as_mut().reset(deadline);
        sleep.as_mut().await;

        self.next = Some(next_tick(deadline, self.period, Instant::now()));
        deadline
    }

    fn stop(&mut self) {
        self.next = None;
    }
}
